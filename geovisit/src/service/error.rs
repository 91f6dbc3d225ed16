//! Errors surfaced by the query service.

use thiserror::Error;
use tracing::error;

use crate::geo::CoordError;
use crate::model::TimeRangeError;
use crate::store::{FilterError, StoreError};
use crate::zone::ZoneError;

/// The only error type returned upward from [`super::TrackingService`].
///
/// Messages never carry backend detail; that is logged when the error is
/// created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error")]
    Internal,
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => QueryError::NotFound(what),
            StoreError::Invalid(msg) => QueryError::InvalidInput(msg),
            other => {
                error!(error = %other, "Store operation failed");
                QueryError::Internal
            }
        }
    }
}

impl From<CoordError> for QueryError {
    fn from(err: CoordError) -> Self {
        QueryError::InvalidInput(err.to_string())
    }
}

impl From<ZoneError> for QueryError {
    fn from(err: ZoneError) -> Self {
        QueryError::InvalidInput(err.to_string())
    }
}

impl From<FilterError> for QueryError {
    fn from(err: FilterError) -> Self {
        QueryError::InvalidInput(err.to_string())
    }
}

impl From<TimeRangeError> for QueryError {
    fn from(err: TimeRangeError) -> Self {
        QueryError::InvalidInput(err.to_string())
    }
}
