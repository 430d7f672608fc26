//! Parsing rendered source text into documents.

use serde::Deserialize;
use tracing::debug;

use crate::value::{Map, Value};

/// Parses rendered text into the documents it contains.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<Vec<Map>, ParseError>;
}

/// YamlParser reads YAML streams.
///
/// A stream may hold several `---` separated documents; a document whose
/// root is a list contributes each mapping of that list. Empty documents
/// and non-mapping roots are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlParser;

impl YamlParser {
    pub fn new() -> Self {
        YamlParser
    }
}

impl DocumentParser for YamlParser {
    fn parse(&self, text: &str) -> Result<Vec<Map>, ParseError> {
        let mut docs = Vec::new();
        for document in serde_yaml::Deserializer::from_str(text) {
            let value = Value::deserialize(document)
                .map_err(|e| ParseError::new(format!("failed to parse YAML: {}", e)))?;
            collect_documents(value, &mut docs);
        }
        Ok(docs)
    }
}

/// JsonParser reads a single JSON value, either one object or a list of
/// objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl DocumentParser for JsonParser {
    fn parse(&self, text: &str) -> Result<Vec<Map>, ParseError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ParseError::new(format!("failed to parse JSON: {}", e)))?;
        let mut docs = Vec::new();
        collect_documents(value, &mut docs);
        Ok(docs)
    }
}

fn collect_documents(value: Value, docs: &mut Vec<Map>) {
    match value {
        Value::Map(m) => docs.push(m),
        Value::List(items) => {
            for item in items {
                match item {
                    Value::Map(m) => docs.push(m),
                    other => debug!(type_name = other.type_name(), "ignoring non-mapping list item"),
                }
            }
        }
        Value::Null => {}
        other => debug!(type_name = other.type_name(), "ignoring non-mapping document"),
    }
}

/// Error type for parsing operations.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}
