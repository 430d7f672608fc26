//! # Reactive Config
//!
//! Reactive configuration trees for long-running processes.
//!
//! Configuration documents are loaded from a set of directories, merged by
//! `kind` and `metadata.name` into one tree, and applied to a store. Each
//! apply diffs the candidate against the committed tree, so validators and
//! deployers can react only to the subtrees that actually changed.
//!
//! ## Modules
//!
//! - [`value`] - In-memory representation of configuration trees
//! - [`diff`] - Changed/added/removed deltas between two trees
//! - [`transform`] - Key-driven preprocessing of trees
//! - [`merger`] - Grouping of documents by kind and name
//! - [`source`] - Rendering, parsing and loading of source directories
//! - [`store`] - The committed tree and the apply pipeline
//! - [`logging`] - A deployer driven by the logging config document

pub mod diff;
pub mod error;
pub mod logging;
pub mod merger;
pub mod source;
pub mod store;
pub mod transform;
pub mod value;

pub use diff::{diff, DiffResult};
pub use error::{Error, Result};
pub use logging::{LogSettings, LoggingDeployer};
pub use merger::{merge_documents, ConflictPolicy, DocumentKey, Merger};
pub use source::{DirectoryLoader, DocumentParser, PlaceholderRenderer, TemplateRenderer, YamlParser};
pub use store::{
    ApplyError, ApplyOutcome, ApplyState, ConfigStore, ConfigStoreBuilder, DiffTiming,
};
pub use transform::Preprocessor;
pub use value::{Map, Value};
