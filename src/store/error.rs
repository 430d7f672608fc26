//! Apply pipeline errors.

use std::fmt;
use thiserror::Error;

use super::stages::BoxError;
use crate::source::LoadError;

/// DeployError is the failure of one named deployer.
#[derive(Debug, Error)]
#[error("deployer '{deployer}' failed: {source}")]
pub struct DeployError {
    pub deployer: String,
    #[source]
    pub source: BoxError,
}

impl DeployError {
    /// Creates a new DeployError.
    pub fn new(deployer: impl Into<String>, source: BoxError) -> Self {
        DeployError {
            deployer: deployer.into(),
            source,
        }
    }
}

/// DeployErrors is a collection of deployer failures from one apply.
#[derive(Debug, Default)]
pub struct DeployErrors {
    errors: Vec<DeployError>,
}

impl DeployErrors {
    /// Creates a new empty DeployErrors.
    pub fn new() -> Self {
        DeployErrors { errors: Vec::new() }
    }

    /// Adds an error.
    pub fn add(&mut self, error: DeployError) {
        self.errors.push(error);
    }

    /// Returns true if there are no errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns an iterator over the errors.
    pub fn iter(&self) -> impl Iterator<Item = &DeployError> {
        self.errors.iter()
    }

    /// Names of the failed deployers, in registration order.
    pub fn deployers(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.deployer.as_str()).collect()
    }
}

impl fmt::Display for DeployErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("\n"))
    }
}

impl std::error::Error for DeployErrors {}

impl IntoIterator for DeployErrors {
    type Item = DeployError;
    type IntoIter = std::vec::IntoIter<DeployError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// ApplyError reports why a candidate was not committed.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// A validator returned false. No deployer ran.
    ///
    /// `documents` names the top-level documents the candidate changed,
    /// added or removed.
    #[error(
        "config failed validation: rejected by '{validator}'{}",
        documents_suffix(.documents)
    )]
    Rejected {
        validator: String,
        documents: Vec<String>,
    },

    /// At least one deployer failed. Deployers that succeeded keep their
    /// side effects.
    #[error("{n} deployer(s) failed:\n{0}", n = .0.len())]
    DeployFailed(DeployErrors),

    #[error(transparent)]
    Load(#[from] LoadError),
}

fn documents_suffix(documents: &[String]) -> String {
    if documents.is_empty() {
        String::new()
    } else {
        format!(" (documents: {})", documents.join(", "))
    }
}
