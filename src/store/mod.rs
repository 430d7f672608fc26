//! Store module - The committed configuration and the apply pipeline.
//!
//! A [`ConfigStore`] holds the currently committed tree and replaces it
//! only when a candidate has gone through every registered stage:
//! diff, preprocess, validate, deploy, commit. Readers take lock-free
//! [`snapshot`](ConfigStore::snapshot)s and never see a partial update.

mod error;
mod stages;
mod store;

pub use error::*;
pub use stages::*;
pub use store::*;
