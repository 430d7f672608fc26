//! Typed view of a logging config document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;

use crate::value::{Map, Value, ValueError};

/// LoggingError reports why a logging document could not be deployed.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("config '{0}' has no spec mapping")]
    MissingSpec(String),

    #[error("invalid or missing '{0}' field")]
    MissingField(String),

    #[error("unknown log level '{0}'")]
    UnknownLevel(String),

    #[error("unknown core type '{0}'")]
    UnknownCore(String),

    #[error("core '{0}' has no rotation settings")]
    MissingRotation(String),

    #[error("invalid '{field}': {source}")]
    InvalidNumber {
        field: String,
        #[source]
        source: ValueError,
    },

    #[error("failed to create log directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Output format of a core. Anything but `json` is console text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    Console,
}

/// Size-based rotation of a log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rotation {
    /// Megabytes before a file is rotated.
    pub max_size: i64,
    pub max_backups: i64,
    /// Days a rotated file is kept.
    pub max_age: i64,
    pub compress: bool,
}

/// Where a core writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreTarget {
    Console,
    RotatingFile { path: PathBuf, rotation: Rotation },
}

/// One output of the logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCore {
    pub level: LevelFilter,
    pub encoding: Encoding,
    pub target: CoreTarget,
}

/// LogSettings is the parsed `spec` of a logging config document.
///
/// ```yaml
/// level: info
/// cores:
///   console: {level: debug, encoding: console}
///   rotating_file:
///     level: info
///     encoding: json
///     outputPath: /var/log/app.log
///     rotation: {maxSize: 10, maxBackups: 3, maxAge: 7, compress: true}
/// ```
///
/// Core names select the target: `console` or `rotating_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LevelFilter,
    pub cores: BTreeMap<String, LogCore>,
}

impl LogSettings {
    /// Parses a logging `spec` mapping.
    pub fn from_spec(spec: &Map) -> Result<Self, LoggingError> {
        let level = spec
            .get_str("level")
            .ok_or_else(|| LoggingError::MissingField("level".to_string()))?;
        let level = parse_level(level).ok_or_else(|| LoggingError::UnknownLevel(level.to_string()))?;

        let cores_map = spec
            .get_map("cores")
            .ok_or_else(|| LoggingError::MissingField("cores".to_string()))?;
        let mut cores = BTreeMap::new();
        for (name, core) in cores_map.iter() {
            let core = core
                .as_map()
                .ok_or_else(|| LoggingError::MissingField(format!("cores.{}", name)))?;
            cores.insert(name.clone(), LogCore::from_map(name, core)?);
        }

        Ok(LogSettings { level, cores })
    }

    /// Parent directories of every file a core writes to.
    pub fn output_dirs(&self) -> Vec<&Path> {
        self.cores
            .values()
            .filter_map(|core| match &core.target {
                CoreTarget::RotatingFile { path, .. } => path.parent(),
                CoreTarget::Console => None,
            })
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect()
    }
}

impl LogCore {
    fn from_map(name: &str, core: &Map) -> Result<Self, LoggingError> {
        let field = |key: &str| format!("cores.{}.{}", name, key);

        let level_name = core
            .get_str("level")
            .ok_or_else(|| LoggingError::MissingField(field("level")))?;
        let level = parse_level(level_name).unwrap_or_else(|| {
            debug!(core = name, level = level_name, "unknown core level, using info");
            LevelFilter::INFO
        });

        let encoding = match core.get_str("encoding") {
            Some("json") => Encoding::Json,
            Some(_) => Encoding::Console,
            None => return Err(LoggingError::MissingField(field("encoding"))),
        };

        let target = match name {
            "console" => CoreTarget::Console,
            "rotating_file" => {
                let path = core
                    .get_str("outputPath")
                    .ok_or_else(|| LoggingError::MissingField(field("outputPath")))?;
                let rotation = core
                    .get_map("rotation")
                    .ok_or_else(|| LoggingError::MissingRotation(name.to_string()))?;
                CoreTarget::RotatingFile {
                    path: PathBuf::from(path),
                    rotation: Rotation::from_map(rotation, &field("rotation"))?,
                }
            }
            other => return Err(LoggingError::UnknownCore(other.to_string())),
        };

        Ok(LogCore {
            level,
            encoding,
            target,
        })
    }
}

impl Rotation {
    fn from_map(rotation: &Map, prefix: &str) -> Result<Self, LoggingError> {
        let compress = rotation
            .get("compress")
            .and_then(Value::as_bool)
            .ok_or_else(|| LoggingError::MissingField(format!("{}.compress", prefix)))?;
        Ok(Rotation {
            max_size: count(rotation, "maxSize", prefix)?,
            max_backups: count(rotation, "maxBackups", prefix)?,
            max_age: count(rotation, "maxAge", prefix)?,
            compress,
        })
    }
}

/// An unset count is 0; a set one must coerce to an integer.
fn count(rotation: &Map, key: &str, prefix: &str) -> Result<i64, LoggingError> {
    match rotation.get(key) {
        Some(value) => value.to_int().map_err(|source| LoggingError::InvalidNumber {
            field: format!("{}.{}", prefix, key),
            source,
        }),
        None => {
            debug!(field = key, "rotation field not set, using 0");
            Ok(0)
        }
    }
}

/// Maps a level name to a filter. The fatal-style names collapse to error.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" => Some(LevelFilter::INFO),
        "warn" | "warning" => Some(LevelFilter::WARN),
        "error" | "dpanic" | "panic" | "fatal" => Some(LevelFilter::ERROR),
        "off" => Some(LevelFilter::OFF),
        _ => None,
    }
}
