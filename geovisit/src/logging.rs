//! `tracing` subscriber setup.
//!
//! Installs a registry with an `EnvFilter` (`RUST_LOG` wins over the
//! configured level), a stdout layer, and optionally a daily-rotated file
//! layer written through a non-blocking appender.

use std::path::{Path, PathBuf};

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing::info;
pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default log level when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// File name prefix for rotated log files.
pub const LOG_FILE_PREFIX: &str = "geovisit.log";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `geovisit=debug,warn`.
    pub level: String,
    /// Directory for daily log files; stdout only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directive}': {message}")]
    InvalidFilter { directive: String, message: String },

    #[error("cannot create log directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("a global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Installs the global subscriber.
///
/// The returned guard flushes the file writer when dropped; keep it alive for
/// the life of the process. `None` when logging to stdout only.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = build_filter(&config.level)?;

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_timer(UtcTime::new(Rfc3339));

    let registry = tracing_subscriber::registry().with(filter).with(stdout_layer);

    match &config.directory {
        Some(dir) => {
            let appender = file_appender(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_timer(UtcTime::new(Rfc3339))
                .with_writer(writer);
            registry
                .with(file_layer)
                .try_init()
                .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
            info!(directory = %dir.display(), "Logging to stdout and daily files");
            Ok(Some(guard))
        }
        None => {
            registry
                .try_init()
                .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
            Ok(None)
        }
    }
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter {
        directive: level.to_string(),
        message: e.to_string(),
    })
}

fn file_appender(dir: &Path) -> Result<RollingFileAppender, LoggingError> {
    std::fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.directory.is_none());
    }

    #[test]
    fn test_file_appender_creates_directory() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("nested").join("logs");
        file_appender(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_builder() {
        let config = LoggingConfig::default()
            .with_level("debug")
            .with_directory("/tmp/geovisit");
        assert_eq!(config.level, "debug");
        assert_eq!(config.directory, Some(PathBuf::from("/tmp/geovisit")));
    }
}
