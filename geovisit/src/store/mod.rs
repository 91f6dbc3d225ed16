//! Persistence boundary.
//!
//! The pipeline never owns stored data: it reads zones, visits and positions
//! through these traits for the duration of one processing step and writes
//! back through single-row create/update calls.
//!
//! # Dyn Compatibility
//!
//! Methods return [`BoxFuture`] so stores can be shared as `Arc<dyn VisitStore>`
//! across the ingestion loops and the query service.
//!
//! # Active-visit invariant
//!
//! [`VisitStore::create_visit`] is a conditional insert. Implementations must
//! refuse to create a second active visit for the same (entity, zone) pair and
//! return [`StoreError::Conflict`] instead. Together with per-pair locking in
//! [`crate::visit::VisitTracker`] this keeps at most one active visit per pair
//! even when several workers or processes share a store.

mod filter;
mod memory;

pub use filter::{FilterError, VisitFilter};
pub use memory::MemoryStore;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{EntityId, NewVisit, Position, Visit, VisitKey, ZoneId};
use crate::zone::{NewZone, Zone};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors reported by a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// An active visit already exists for this pair.
    #[error("active visit already exists for {0}")]
    Conflict(VisitKey),

    /// The record violates a domain rule.
    #[error("invalid record: {0}")]
    Invalid(String),

    /// Backend failure (I/O, connection, driver).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Zone catalog storage.
pub trait ZoneStore: Send + Sync {
    /// All zones, in any order.
    fn all_zones(&self) -> BoxFuture<'_, StoreResult<Vec<Zone>>>;

    /// One zone by id; `NotFound` if it does not exist.
    fn zone(&self, id: ZoneId) -> BoxFuture<'_, StoreResult<Zone>>;

    /// Validates and stores a zone, assigning its id.
    fn create_zone(&self, zone: NewZone) -> BoxFuture<'_, StoreResult<Zone>>;
}

/// Visit storage.
pub trait VisitStore: Send + Sync {
    /// The visit with a null `end_at` for this pair, if any.
    fn active_visit(&self, key: VisitKey) -> BoxFuture<'_, StoreResult<Option<Visit>>>;

    /// Inserts a new active visit unless one already exists for the pair.
    fn create_visit(&self, visit: NewVisit) -> BoxFuture<'_, StoreResult<Visit>>;

    /// Replaces a stored visit; `NotFound` if its id is unknown.
    fn update_visit(&self, visit: Visit) -> BoxFuture<'_, StoreResult<()>>;

    /// Visits matching every set field of the filter, ordered by id.
    fn visits(&self, filter: VisitFilter) -> BoxFuture<'_, StoreResult<Vec<Visit>>>;
}

/// Position (raw trail) storage.
pub trait PositionStore: Send + Sync {
    fn all_positions(&self) -> BoxFuture<'_, StoreResult<Vec<Position>>>;

    /// Positions observed within `[from, to]`, both ends inclusive.
    fn positions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BoxFuture<'_, StoreResult<Vec<Position>>>;

    /// The most recently observed position of an entity.
    fn latest_position(&self, entity_id: EntityId) -> BoxFuture<'_, StoreResult<Position>>;

    fn create_position(&self, position: Position) -> BoxFuture<'_, StoreResult<()>>;
}

/// Handles to the three stores used by the pipeline and the query service.
#[derive(Clone)]
pub struct Stores {
    pub zones: Arc<dyn ZoneStore>,
    pub visits: Arc<dyn VisitStore>,
    pub positions: Arc<dyn PositionStore>,
}

impl Stores {
    /// Uses one backend for all three roles.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: ZoneStore + VisitStore + PositionStore + 'static,
    {
        Self {
            zones: store.clone(),
            visits: store.clone(),
            positions: store,
        }
    }
}
