//! Errors raised while loading configuration sources.

use std::path::PathBuf;
use thiserror::Error;

use super::parser::ParseError;
use super::template::TemplateError;
use crate::merger::MergeError;

/// Errors that can occur while loading a configuration directory set.
///
/// All of them are fatal for the load cycle that raised them; the caller
/// decides whether to abort or keep the previously committed tree.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("config directory '{0}' does not exist")]
    MissingDirectory(PathBuf),

    #[error("failed to read config directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render template '{path}': {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: TemplateError,
    },

    #[error("failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("failed to merge '{path}': {source}")]
    Merge {
        path: PathBuf,
        #[source]
        source: MergeError,
    },
}

impl LoadError {
    /// Path of the directory or file the error is about.
    pub fn path(&self) -> &PathBuf {
        match self {
            LoadError::MissingDirectory(path) => path,
            LoadError::ReadDirectory { path, .. }
            | LoadError::ReadFile { path, .. }
            | LoadError::Template { path, .. }
            | LoadError::Parse { path, .. }
            | LoadError::Merge { path, .. } => path,
        }
    }
}
