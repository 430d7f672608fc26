//! Pipeline stage traits.

use crate::diff::DiffResult;
use crate::transform::Preprocessor;
use crate::value::Map;

/// Error type returned by deployers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Rewrites a candidate tree in place before validation.
pub trait Preprocess: Send + Sync {
    fn preprocess(&self, candidate: &mut Map);
}

impl Preprocess for Preprocessor {
    fn preprocess(&self, candidate: &mut Map) {
        self.apply(candidate);
    }
}

impl<F> Preprocess for F
where
    F: Fn(&mut Map) + Send + Sync,
{
    fn preprocess(&self, candidate: &mut Map) {
        self(candidate)
    }
}

/// Vetoes a candidate tree.
///
/// Receives the preprocessed candidate, the committed tree and the diff
/// between them.
pub trait Validate: Send + Sync {
    fn validate(&self, candidate: &Map, current: &Map, diff: &DiffResult) -> bool;
}

impl<F> Validate for F
where
    F: Fn(&Map, &Map, &DiffResult) -> bool + Send + Sync,
{
    fn validate(&self, candidate: &Map, current: &Map, diff: &DiffResult) -> bool {
        self(candidate, current, diff)
    }
}

/// Reconfigures a live subsystem from a validated candidate tree.
///
/// Implementations should check [`DiffResult::contains`] for the subtree
/// they care about and return early when it is untouched.
pub trait Deploy: Send + Sync {
    fn deploy(&self, candidate: &Map, current: &Map, diff: &DiffResult) -> Result<(), BoxError>;
}

impl<F> Deploy for F
where
    F: Fn(&Map, &Map, &DiffResult) -> Result<(), BoxError> + Send + Sync,
{
    fn deploy(&self, candidate: &Map, current: &Map, diff: &DiffResult) -> Result<(), BoxError> {
        self(candidate, current, diff)
    }
}
