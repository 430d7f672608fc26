//! ConfigStore and the apply pipeline.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, info, info_span, warn};

use super::error::{ApplyError, DeployError, DeployErrors};
use super::stages::{Deploy, Preprocess, Validate};
use crate::diff::{diff, DiffResult};
use crate::source::DirectoryLoader;
use crate::value::Map;

/// When the diff handed to validators and deployers is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiffTiming {
    /// Diff the raw candidate before any preprocessor runs. Paths in the
    /// diff use the source key names even when a preprocessor renamed them.
    ///
    /// The committed tree holds the renamed keys, so a document containing
    /// a key that a preprocessor renames shows up in the diff on every
    /// apply, even when its sources did not change. Deployers gated on
    /// [`DiffResult::contains`] then rerun each time. Use
    /// [`AfterPreprocess`](Self::AfterPreprocess) when that matters.
    #[default]
    BeforePreprocess,
    /// Diff the preprocessed candidate, so paths match the tree that
    /// validators and deployers receive.
    AfterPreprocess,
}

/// Stage reached by the apply pipeline.
///
/// `Idle`, `Committed`, `Rejected` and `Failed` are the states a store is
/// left in between runs; the others are only seen while `apply` runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApplyState {
    #[default]
    Idle,
    Diffed,
    Preprocessed,
    Validated,
    Deployed,
    Committed,
    Rejected,
    Failed,
}

impl fmt::Display for ApplyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplyState::Idle => "idle",
            ApplyState::Diffed => "diffed",
            ApplyState::Preprocessed => "preprocessed",
            ApplyState::Validated => "validated",
            ApplyState::Deployed => "deployed",
            ApplyState::Committed => "committed",
            ApplyState::Rejected => "rejected",
            ApplyState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a committed apply.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// The diff validators and deployers were given.
    pub diff: DiffResult,
    pub state: ApplyState,
}

struct Stage<T: ?Sized> {
    name: String,
    stage: Box<T>,
}

impl<T: ?Sized> Stage<T> {
    fn new(name: impl Into<String>, stage: Box<T>) -> Self {
        Stage {
            name: name.into(),
            stage,
        }
    }
}

/// ConfigStoreBuilder is a builder for creating a ConfigStore.
#[derive(Default)]
pub struct ConfigStoreBuilder {
    initial: Map,
    diff_timing: DiffTiming,
    preprocessors: Vec<Stage<dyn Preprocess>>,
    validators: Vec<Stage<dyn Validate>>,
    deployers: Vec<Stage<dyn Deploy>>,
}

impl ConfigStoreBuilder {
    /// Creates a new ConfigStoreBuilder.
    pub fn new() -> Self {
        ConfigStoreBuilder::default()
    }

    /// Sets the tree the store starts with. Defaults to an empty map.
    pub fn initial(mut self, tree: Map) -> Self {
        self.initial = tree;
        self
    }

    pub fn diff_timing(mut self, timing: DiffTiming) -> Self {
        self.diff_timing = timing;
        self
    }

    /// Registers a preprocessor. Preprocessors run in registration order.
    pub fn preprocessor(mut self, name: impl Into<String>, p: impl Preprocess + 'static) -> Self {
        self.preprocessors.push(Stage::new(name, Box::new(p)));
        self
    }

    /// Registers a validator. Validators run in registration order and the
    /// first one returning false stops the pipeline.
    pub fn validator(mut self, name: impl Into<String>, v: impl Validate + 'static) -> Self {
        self.validators.push(Stage::new(name, Box::new(v)));
        self
    }

    /// Registers a deployer. Deployers run in registration order.
    pub fn deployer(mut self, name: impl Into<String>, d: impl Deploy + 'static) -> Self {
        self.deployers.push(Stage::new(name, Box::new(d)));
        self
    }

    /// Builds the ConfigStore.
    pub fn build(self) -> ConfigStore {
        ConfigStore {
            current: ArcSwap::from_pointee(self.initial),
            apply_lock: Mutex::new(()),
            state: Mutex::new(ApplyState::Idle),
            diff_timing: self.diff_timing,
            preprocessors: self.preprocessors,
            validators: self.validators,
            deployers: self.deployers,
        }
    }
}

/// ConfigStore holds the committed configuration tree.
///
/// The tree is only ever replaced as a whole, by a successful
/// [`apply`](Self::apply). Reads go through [`snapshot`](Self::snapshot)
/// and never block; concurrent `apply` calls are serialized.
pub struct ConfigStore {
    current: ArcSwap<Map>,
    apply_lock: Mutex<()>,
    state: Mutex<ApplyState>,
    diff_timing: DiffTiming,
    preprocessors: Vec<Stage<dyn Preprocess>>,
    validators: Vec<Stage<dyn Validate>>,
    deployers: Vec<Stage<dyn Deploy>>,
}

impl ConfigStore {
    /// Creates a new ConfigStoreBuilder.
    pub fn builder() -> ConfigStoreBuilder {
        ConfigStoreBuilder::new()
    }

    /// Returns the committed tree.
    pub fn snapshot(&self) -> Arc<Map> {
        self.current.load_full()
    }

    /// Returns the state the last pipeline run reached.
    pub fn state(&self) -> ApplyState {
        *self.state.lock()
    }

    pub fn diff_timing(&self) -> DiffTiming {
        self.diff_timing
    }

    /// Loads the `Config` documents of `loader` and applies them.
    pub fn load(&self, loader: &DirectoryLoader) -> Result<ApplyOutcome, ApplyError> {
        let candidate = loader.load_config()?;
        self.apply(candidate)
    }

    /// Runs `candidate` through the pipeline and commits it on success.
    ///
    /// The candidate is diffed against the committed tree, preprocessed,
    /// validated and deployed. On a validator veto the pipeline stops with
    /// [`ApplyError::Rejected`]; otherwise every deployer runs and their
    /// failures are returned together as [`ApplyError::DeployFailed`]. In
    /// both cases the committed tree is left as it was.
    ///
    /// Known limitation: deployer side effects are not rolled back. When a
    /// deployer fails after another one has already reconfigured its
    /// subsystem, that subsystem reflects the candidate while
    /// [`snapshot`](Self::snapshot) still returns the old tree.
    ///
    /// A stage that panics leaves the store in [`ApplyState::Failed`] with
    /// the committed tree unchanged.
    pub fn apply(&self, mut candidate: Map) -> Result<ApplyOutcome, ApplyError> {
        let _guard = self.apply_lock.lock();
        let _unwind = FailOnUnwind(&self.state);
        let span = info_span!("apply");
        let _enter = span.enter();

        let current = self.current.load_full();

        let mut delta = diff(&candidate, &current);
        self.transition(ApplyState::Diffed);

        for p in &self.preprocessors {
            debug!(preprocessor = %p.name, "running preprocessor");
            p.stage.preprocess(&mut candidate);
        }
        if self.diff_timing == DiffTiming::AfterPreprocess {
            delta = diff(&candidate, &current);
        }
        self.transition(ApplyState::Preprocessed);

        for v in &self.validators {
            if !v.stage.validate(&candidate, &current, &delta) {
                warn!(validator = %v.name, "candidate rejected");
                self.transition(ApplyState::Rejected);
                return Err(ApplyError::Rejected {
                    validator: v.name.clone(),
                    documents: delta.documents(),
                });
            }
        }
        self.transition(ApplyState::Validated);

        let mut errors = DeployErrors::new();
        for d in &self.deployers {
            debug!(deployer = %d.name, "running deployer");
            if let Err(e) = d.stage.deploy(&candidate, &current, &delta) {
                warn!(deployer = %d.name, error = %e, "deployer failed");
                errors.add(DeployError::new(d.name.clone(), e));
            }
        }
        if !errors.is_empty() {
            self.transition(ApplyState::Failed);
            return Err(ApplyError::DeployFailed(errors));
        }
        self.transition(ApplyState::Deployed);

        self.current.store(Arc::new(candidate));
        self.transition(ApplyState::Committed);
        info!(
            changed = delta.has_changed(),
            added = delta.has_added(),
            removed = delta.has_removed(),
            "configuration committed"
        );

        Ok(ApplyOutcome {
            diff: delta,
            state: ApplyState::Committed,
        })
    }

    fn transition(&self, next: ApplyState) {
        let mut state = self.state.lock();
        let prev = *state;
        debug!(from = %prev, to = %next, "apply state");
        *state = next;
    }
}

/// Marks the run failed when a stage panics out of `apply`.
struct FailOnUnwind<'a>(&'a Mutex<ApplyState>);

impl Drop for FailOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!("apply unwound by a panicking stage");
            *self.0.lock() = ApplyState::Failed;
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        ConfigStoreBuilder::new().build()
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("state", &self.state())
            .field("diff_timing", &self.diff_timing)
            .field("preprocessors", &stage_names(&self.preprocessors))
            .field("validators", &stage_names(&self.validators))
            .field("deployers", &stage_names(&self.deployers))
            .finish_non_exhaustive()
    }
}

fn stage_names<T: ?Sized>(stages: &[Stage<T>]) -> Vec<&str> {
    stages.iter().map(|s| s.name.as_str()).collect()
}
