//! Diff result types.

use std::collections::BTreeSet;
use std::fmt;

use crate::value::{Map, Value};

/// DiffResult holds the result of comparing a candidate tree with the
/// current one.
///
/// Each part only contains the paths where something differs; empty nested
/// maps are never stored. A given leaf path appears in at most one part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// Values present in both trees that differ, holding the candidate value.
    pub changed: Map,
    /// Values present only in the candidate.
    pub added: Map,
    /// Values present only in the current tree, holding the old value.
    pub removed: Map,
}

impl DiffResult {
    /// Creates a new empty DiffResult.
    pub fn new() -> Self {
        DiffResult {
            changed: Map::new(),
            added: Map::new(),
            removed: Map::new(),
        }
    }

    /// Returns true if the compared trees were equal.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }

    pub fn has_changed(&self) -> bool {
        !self.changed.is_empty()
    }

    pub fn has_added(&self) -> bool {
        !self.added.is_empty()
    }

    pub fn has_removed(&self) -> bool {
        !self.removed.is_empty()
    }

    /// Returns true if `path` resolves inside any of the three parts.
    ///
    /// The path may stop at an intermediate key: `["b"]` matches when
    /// anything below `b` differs. An empty path never matches.
    pub fn contains<S: AsRef<str>>(&self, path: &[S]) -> bool {
        path_exists(&self.changed, path)
            || path_exists(&self.added, path)
            || path_exists(&self.removed, path)
    }

    /// Top-level keys touched by any part, sorted and deduplicated.
    ///
    /// In a merged config tree these are the names of the documents that
    /// differ.
    pub fn documents(&self) -> Vec<String> {
        let keys: BTreeSet<&String> = self
            .changed
            .keys()
            .chain(self.added.keys())
            .chain(self.removed.keys())
            .collect();
        keys.into_iter().cloned().collect()
    }

    /// Leaf paths of every part, as dotted strings, in a stable order.
    pub fn paths(&self) -> DiffPaths {
        DiffPaths {
            changed: leaf_paths(&self.changed),
            added: leaf_paths(&self.added),
            removed: leaf_paths(&self.removed),
        }
    }
}

/// Dotted leaf paths of a [`DiffResult`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffPaths {
    pub changed: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

fn path_exists<S: AsRef<str>>(data: &Map, path: &[S]) -> bool {
    let Some((first, rest)) = path.split_first() else {
        return false;
    };
    let mut current = match data.get(first.as_ref()) {
        Some(value) => value,
        None => return false,
    };
    for key in rest {
        current = match current {
            Value::Map(m) => match m.get(key.as_ref()) {
                Some(value) => value,
                None => return false,
            },
            _ => return false,
        };
    }
    true
}

fn leaf_paths(map: &Map) -> Vec<String> {
    let mut out = Vec::new();
    collect_leaf_paths(map, &mut Vec::new(), &mut out);
    out
}

fn collect_leaf_paths<'a>(map: &'a Map, prefix: &mut Vec<&'a str>, out: &mut Vec<String>) {
    for (key, value) in map.iter() {
        prefix.push(key);
        match value {
            Value::Map(nested) if !nested.is_empty() => collect_leaf_paths(nested, prefix, out),
            _ => out.push(prefix.join(".")),
        }
        prefix.pop();
    }
}

impl fmt::Display for DiffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths = self.paths();
        let sections = [
            ("Changed", &paths.changed),
            ("Added", &paths.added),
            ("Removed", &paths.removed),
        ];

        let mut first = true;
        for (title, list) in sections {
            if list.is_empty() {
                continue;
            }
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "- {}:", title)?;
            for path in list {
                write!(f, "\n  {}", path)?;
            }
        }

        Ok(())
    }
}
