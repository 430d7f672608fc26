//! Transform module - Key-driven rewriting of configuration trees.
//!
//! A [`Preprocessor`] finds keys matching a predicate anywhere in a tree,
//! renames them and rewrites their values, then keeps looking inside the
//! rewritten values as well as the untouched ones.

mod paths;
mod preprocessor;

pub use paths::*;
pub use preprocessor::*;
