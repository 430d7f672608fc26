//! Diff module - Structural differences between two configuration trees.
//!
//! [`diff`] walks two maps side by side and reports what the candidate
//! changed, added and removed relative to the current tree. The result is
//! co-shaped with the inputs, so a caller can ask whether anything below a
//! given key moved with [`DiffResult::contains`].

mod engine;
mod result;


pub use engine::*;
pub use result::*;
