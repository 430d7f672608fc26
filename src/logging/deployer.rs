//! Deployer that reconfigures logging when its config document changes.

use std::fmt;
use std::fs;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{reload, EnvFilter};

use super::settings::{LogSettings, LoggingError};
use crate::diff::DiffResult;
use crate::store::{BoxError, Deploy};
use crate::value::{Map, Value};

/// Name of the logging config document the deployer watches by default.
pub const LOGGING_CONFIG: &str = "zap_logging_config";

type LevelHook = Box<dyn Fn(LevelFilter) -> Result<(), BoxError> + Send + Sync>;

/// LoggingDeployer publishes [`LogSettings`] whenever the logging document
/// of a candidate differs from the committed one.
///
/// On each such apply it parses `<config>.spec` and creates the directories
/// of every file core. It then hands the top-level level to the level hook,
/// if one is set, and stores the settings where
/// [`settings`](Self::settings) readers see them. Applies that leave the
/// document untouched do nothing. Removing the document clears the
/// published settings.
pub struct LoggingDeployer {
    config_name: String,
    settings: Arc<ArcSwapOption<LogSettings>>,
    level_hook: Option<LevelHook>,
}

impl LoggingDeployer {
    /// Creates a deployer watching [`LOGGING_CONFIG`].
    pub fn new() -> Self {
        LoggingDeployer {
            config_name: LOGGING_CONFIG.to_string(),
            settings: Arc::new(ArcSwapOption::empty()),
            level_hook: None,
        }
    }

    /// Watches another document name.
    pub fn with_config_name(mut self, name: impl Into<String>) -> Self {
        self.config_name = name.into();
        self
    }

    /// Calls `hook` with the new level before the settings are published.
    /// An error fails the deploy.
    pub fn with_level_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(LevelFilter) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.level_hook = Some(Box::new(hook));
        self
    }

    /// Swaps the filter behind a `tracing_subscriber::reload` layer for one
    /// at the new level.
    pub fn with_filter_reload<S: 'static>(self, handle: reload::Handle<EnvFilter, S>) -> Self {
        self.with_level_hook(move |level| {
            handle.reload(EnvFilter::new(level.to_string()))?;
            Ok(())
        })
    }

    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    /// Shared handle to the published settings. Take it before handing the
    /// deployer to a store.
    pub fn settings(&self) -> Arc<ArcSwapOption<LogSettings>> {
        Arc::clone(&self.settings)
    }
}

impl Default for LoggingDeployer {
    fn default() -> Self {
        LoggingDeployer::new()
    }
}

impl fmt::Debug for LoggingDeployer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingDeployer")
            .field("config_name", &self.config_name)
            .field("settings", &self.settings.load_full())
            .field("level_hook", &self.level_hook.is_some())
            .finish()
    }
}

impl Deploy for LoggingDeployer {
    fn deploy(&self, candidate: &Map, _current: &Map, diff: &DiffResult) -> Result<(), BoxError> {
        if !diff.contains(&[self.config_name.as_str()]) {
            return Ok(());
        }
        let Some(document) = candidate.get(&self.config_name) else {
            info!(config = %self.config_name, "logging config removed");
            self.settings.store(None);
            return Ok(());
        };
        let spec = document
            .get_path(&["spec"])
            .and_then(Value::as_map)
            .ok_or_else(|| LoggingError::MissingSpec(self.config_name.clone()))?;
        let settings = LogSettings::from_spec(spec)?;

        for dir in settings.output_dirs() {
            debug!(dir = %dir.display(), "creating log directory");
            fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        if let Some(hook) = &self.level_hook {
            hook(settings.level)?;
        }

        info!(
            config = %self.config_name,
            level = %settings.level,
            cores = settings.cores.len(),
            "logging reconfigured"
        );
        self.settings.store(Some(Arc::new(settings)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::value::from_yaml;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tracing_subscriber::Registry;

    fn map(yaml: &str) -> Map {
        from_yaml(yaml).unwrap().as_map().cloned().unwrap()
    }

    fn config(level: &str, log_file: &Path) -> Map {
        map(&format!(
            "zap_logging_config:
  spec:
    level: {}
    cores:
      rotating_file:
        level: info
        encoding: json
        outputPath: '{}'
        rotation: {{maxSize: 1, maxBackups: 2, maxAge: 3, compress: false}}
other: {{x: 1}}
",
            level,
            log_file.display()
        ))
    }

    fn deploy(deployer: &LoggingDeployer, candidate: &Map, current: &Map) -> Result<(), BoxError> {
        deployer.deploy(candidate, current, &diff(candidate, current))
    }

    #[test]
    fn test_deploy_creates_dirs_and_publishes() {
        let tmp = tempfile::tempdir().unwrap();
        let log_file = tmp.path().join("artifacts").join("log").join("app.log");
        let deployer = LoggingDeployer::new();
        let settings = deployer.settings();

        deploy(&deployer, &config("debug", &log_file), &Map::new()).unwrap();

        assert!(log_file.parent().unwrap().is_dir());
        let published = settings.load_full().unwrap();
        assert_eq!(published.level, LevelFilter::DEBUG);
        assert_eq!(published.output_dirs(), vec![log_file.parent().unwrap()]);
    }

    #[test]
    fn test_untouched_document_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let log_file = tmp.path().join("app.log");
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let deployer = LoggingDeployer::new().with_level_hook(move |level| {
            sink.lock().push(level);
            Ok(())
        });

        let current = config("info", &log_file);
        let mut candidate = current.clone();
        candidate.set("other", map("{x: 2}"));
        deploy(&deployer, &candidate, &current).unwrap();

        assert!(calls.lock().is_empty());
        assert!(deployer.settings().load_full().is_none());

        deploy(&deployer, &config("warn", &log_file), &current).unwrap();
        assert_eq!(*calls.lock(), vec![LevelFilter::WARN]);
    }

    #[test]
    fn test_invalid_settings_keep_previous() {
        let tmp = tempfile::tempdir().unwrap();
        let log_file = tmp.path().join("app.log");
        let deployer = LoggingDeployer::new();
        let current = config("info", &log_file);
        deploy(&deployer, &current, &Map::new()).unwrap();

        let err = deploy(&deployer, &config("verbose", &log_file), &current).unwrap_err();

        assert_eq!(err.to_string(), "unknown log level 'verbose'");
        assert_eq!(deployer.settings().load_full().unwrap().level, LevelFilter::INFO);
    }

    #[test]
    fn test_missing_spec_is_an_error() {
        let deployer = LoggingDeployer::new().with_config_name("logging_config");
        assert_eq!(deployer.config_name(), "logging_config");

        let err = deploy(&deployer, &map("logging_config: {level: info}"), &Map::new()).unwrap_err();
        assert_eq!(err.to_string(), "config 'logging_config' has no spec mapping");
    }

    #[test]
    fn test_removed_document_clears_settings() {
        let tmp = tempfile::tempdir().unwrap();
        let deployer = LoggingDeployer::new();
        let current = config("info", &tmp.path().join("app.log"));
        deploy(&deployer, &current, &Map::new()).unwrap();

        deploy(&deployer, &map("other: {x: 1}"), &current).unwrap();
        assert!(deployer.settings().load_full().is_none());
    }

    #[test]
    fn test_filter_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let (_layer, handle) = reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("info"));
        let deployer = LoggingDeployer::new().with_filter_reload(handle.clone());

        deploy(&deployer, &config("error", &tmp.path().join("app.log")), &Map::new()).unwrap();

        let hint = handle.with_current(|filter| filter.max_level_hint()).unwrap();
        assert_eq!(hint, Some(LevelFilter::ERROR));
    }

    #[test]
    fn test_filter_reload_fails_without_subscriber() {
        let tmp = tempfile::tempdir().unwrap();
        let (layer, handle) = reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("info"));
        drop(layer);
        let deployer = LoggingDeployer::new().with_filter_reload(handle);

        let result = deploy(&deployer, &config("error", &tmp.path().join("app.log")), &Map::new());
        assert!(result.is_err());
        assert!(deployer.settings().load_full().is_none());
    }
}
