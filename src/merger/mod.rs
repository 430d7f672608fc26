//! Merger module - Groups parsed documents into a single tree.
//!
//! Every document names itself through its `kind` field and its
//! `metadata.name` field. The merged tree is keyed by kind, then by name,
//! and holds the full document as the value.

mod document;
mod merger;

pub use document::*;
pub use merger::*;
