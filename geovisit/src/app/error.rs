//! Application-level error types.

use std::fmt;

use crate::config::ConfigError;
use crate::ingest::IngestError;
use crate::logging::LoggingError;
use crate::store::StoreError;

/// Errors that can occur while starting or running the application.
#[derive(Debug)]
pub enum AppError {
    /// Configuration file could not be loaded or is invalid.
    Config(ConfigError),

    /// Logging could not be initialized.
    Logging(LoggingError),

    /// The zone store was unreachable at startup.
    Store(StoreError),

    /// An ingestion worker stopped on a fatal transport error.
    Ingest(IngestError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Logging(e) => write!(f, "Logging setup failed: {}", e),
            AppError::Store(e) => write!(f, "Store unavailable: {}", e),
            AppError::Ingest(e) => write!(f, "Ingestion failed: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::Logging(e) => Some(e),
            AppError::Store(e) => Some(e),
            AppError::Ingest(e) => Some(e),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<LoggingError> for AppError {
    fn from(err: LoggingError) -> Self {
        AppError::Logging(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        AppError::Ingest(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config(ConfigError::NoConfigDir);
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("no platform config directory"));
    }

    #[test]
    fn test_app_error_from_store_error_keeps_source() {
        let err: AppError = StoreError::Backend("refused".into()).into();
        assert!(matches!(err, AppError::Store(_)));
        assert!(err.source().is_some());
    }
}
