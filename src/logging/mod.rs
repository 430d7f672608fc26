//! Logging module - A deployer that reconfigures logging from the config tree.
//!
//! The logging document's `spec` is parsed into [`LogSettings`] and
//! published through an `ArcSwapOption`, optionally reloading a
//! `tracing_subscriber` filter at the same time.

mod deployer;
mod settings;

pub use deployer::*;
pub use settings::*;
