//! Crate-level error type.

use std::path::PathBuf;
use thiserror::Error;

use crate::logging::LoggingError;
use crate::merger::MergeError;
use crate::source::{LoadError, ParseError};
use crate::store::ApplyError;
use crate::transform::TransformError;
use crate::value::ValueError;

/// Error is the union of every error the crate's operations return.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize: {0}")]
    Serialize(String),
}

impl Error {
    /// Creates an Io error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialize(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialize(err.to_string())
    }
}

/// Result type using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merger::DocumentKey;

    #[test]
    fn test_conversions_keep_messages() {
        let err: Error = MergeError::Conflict {
            key: DocumentKey::new("Config", "a"),
            path: "spec.x".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "conflicting values for Config/a at spec.x");

        let err: Error = LoadError::MissingDirectory(PathBuf::from("/nope")).into();
        assert_eq!(err.to_string(), "config directory '/nope' does not exist");
    }
}
