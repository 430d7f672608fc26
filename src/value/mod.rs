//! Value module - In-memory representation of configuration trees.
//!
//! A tree is built from scalars, ordered lists and string-keyed maps.

mod value;

pub use value::*;
