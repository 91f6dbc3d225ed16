//! CLI error type.

use std::fmt;
use std::path::PathBuf;

use geovisit::config::ConfigError;
use geovisit::logging::LoggingError;
use geovisit::store::StoreError;
use geovisit::AppError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or written.
    Config(ConfigError),

    /// Logging could not be initialized.
    Logging(LoggingError),

    /// The application failed to start or a worker failed.
    App(AppError),

    /// Loading input data into the store failed.
    Store(StoreError),

    /// An input file could not be read.
    Read { path: PathBuf, source: std::io::Error },

    /// An input file is not valid JSON of the expected shape.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Invalid command-line arguments.
    Input(String),

    /// The Tokio runtime could not be created.
    Runtime(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "{}", e),
            CliError::App(e) => write!(f, "{}", e),
            CliError::Store(e) => write!(f, "{}", e),
            CliError::Read { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            CliError::Json { path, source } => {
                write!(f, "Invalid JSON in {}: {}", path.display(), source)
            }
            CliError::Input(msg) => write!(f, "{}", msg),
            CliError::Runtime(e) => write!(f, "Failed to create async runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::App(e) => Some(e),
            CliError::Store(e) => Some(e),
            CliError::Read { source, .. } => Some(source),
            CliError::Json { source, .. } => Some(source),
            CliError::Input(_) => None,
            CliError::Runtime(e) => Some(e),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Config(err)
    }
}

impl From<LoggingError> for CliError {
    fn from(err: LoggingError) -> Self {
        CliError::Logging(err)
    }
}

impl From<AppError> for CliError {
    fn from(err: AppError) -> Self {
        CliError::App(err)
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        CliError::Store(err)
    }
}
