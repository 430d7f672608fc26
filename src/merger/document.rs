//! Document identity.

use std::fmt;

use crate::value::Map;

/// DocumentKey is the `(kind, name)` pair a document is merged under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    pub kind: String,
    pub name: String,
}

impl DocumentKey {
    /// Creates a new document key.
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        DocumentKey {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Reads the key from a document's `kind` and `metadata.name` fields.
    ///
    /// Returns None when either field is missing or not a string.
    pub fn of(doc: &Map) -> Option<Self> {
        let kind = doc.get_str("kind")?;
        let name = doc.get_map("metadata")?.get_str("name")?;
        Some(DocumentKey::new(kind, name))
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}
