//! Source module - Reading configuration documents from disk.
//!
//! Raw files are rendered with template parameters, parsed into documents
//! and handed to the [`Merger`](crate::merger::Merger). Rendering and
//! parsing sit behind the [`TemplateRenderer`] and [`DocumentParser`]
//! traits so other engines can be plugged into a [`DirectoryLoader`].

mod error;
mod loader;
mod parser;
mod template;

pub use error::*;
pub use loader::*;
pub use parser::*;
pub use template::*;
