//! Recorded positions and query time windows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::EntityId;
use crate::geo::{self, CoordError, Coordinate};

/// One location report for an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub entity_id: EntityId,
    pub latitude: f64,
    pub longitude: f64,
    pub observed_at: DateTime<Utc>,
}

impl Position {
    /// Creates a position after validating its coordinates.
    pub fn new(
        entity_id: EntityId,
        latitude: f64,
        longitude: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, CoordError> {
        geo::validate(latitude, longitude)?;
        Ok(Self {
            entity_id,
            latitude,
            longitude,
            observed_at,
        })
    }

    /// The position's coordinate.
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    /// Distance in meters to another position.
    #[inline]
    pub fn distance_to(&self, other: &Position) -> f64 {
        geo::distance_meters(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

/// Errors from parsing a time range.
#[derive(Debug, Error)]
pub enum TimeRangeError {
    #[error("invalid '{field}' timestamp: {source}")]
    Timestamp {
        field: &'static str,
        source: chrono::ParseError,
    },

    #[error("range start {from} is after range end {to}")]
    Inverted {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

/// Inclusive time window `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a range, rejecting `from > to`.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, TimeRangeError> {
        if from > to {
            return Err(TimeRangeError::Inverted { from, to });
        }
        Ok(Self { from, to })
    }

    /// Parses a range from two RFC 3339 timestamps.
    pub fn parse(from: &str, to: &str) -> Result<Self, TimeRangeError> {
        let from = parse_rfc3339(from, "from")?;
        let to = parse_rfc3339(to, "to")?;
        Self::new(from, to)
    }

    /// Whether `at` falls within the range (both ends inclusive).
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at <= self.to
    }
}

fn parse_rfc3339(value: &str, field: &'static str) -> Result<DateTime<Utc>, TimeRangeError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| TimeRangeError::Timestamp { field, source })
}
