//! Observer interface for visit lifecycle notifications.
//!
//! The state machine and the event processor report what they did to an
//! injected [`VisitObserver`] instead of logging inline. Production code uses
//! [`TracingObserver`]; tests can pass [`NoopObserver`] or their own recorder.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::model::{EntityId, Visit, VisitKey, ZoneId};

/// Receives visit lifecycle notifications.
///
/// # Thread Safety
///
/// Observers are shared by every ingestion worker and by the query service,
/// so implementations must be `Send + Sync`.
pub trait VisitObserver: Send + Sync {
    /// A visit was opened for an entity entering a zone.
    fn visit_opened(&self, visit: &Visit);

    /// An active visit was closed because the entity was observed outside.
    fn visit_closed(&self, visit: &Visit);

    /// A create lost the race against a concurrent writer for the same pair.
    ///
    /// The existing active visit stands; nothing was written.
    fn open_conflict(&self, _key: VisitKey) {}

    /// An event's own timestamp was not trusted and processing time was used.
    fn timestamp_rejected(
        &self,
        _entity_id: EntityId,
        _occurred_at: DateTime<Utc>,
        _used: DateTime<Utc>,
    ) {
    }

    /// A synchronous containment check completed.
    fn containment_checked(&self, _entity_id: EntityId, _zone_id: ZoneId, _inside: bool) {}
}

/// Shared observer handle.
pub type SharedObserver = Arc<dyn VisitObserver>;

/// Observer that forwards every notification to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl VisitObserver for TracingObserver {
    fn visit_opened(&self, visit: &Visit) {
        info!(
            visit_id = %visit.id,
            entity_id = %visit.entity_id,
            zone_id = %visit.zone_id,
            start_at = %visit.start_at,
            "Visit opened"
        );
    }

    fn visit_closed(&self, visit: &Visit) {
        info!(
            visit_id = %visit.id,
            entity_id = %visit.entity_id,
            zone_id = %visit.zone_id,
            duration_seconds = visit.duration_seconds,
            "Visit closed"
        );
    }

    fn open_conflict(&self, key: VisitKey) {
        debug!(entity_id = %key.entity_id, zone_id = %key.zone_id, "Visit already active, create skipped");
    }

    fn timestamp_rejected(
        &self,
        entity_id: EntityId,
        occurred_at: DateTime<Utc>,
        used: DateTime<Utc>,
    ) {
        warn!(
            entity_id = %entity_id,
            occurred_at = %occurred_at,
            used = %used,
            "Untrusted event timestamp, using processing time"
        );
    }

    fn containment_checked(&self, entity_id: EntityId, zone_id: ZoneId, inside: bool) {
        debug!(entity_id = %entity_id, zone_id = %zone_id, inside, "Containment checked");
    }
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl VisitObserver for NoopObserver {
    fn visit_opened(&self, _visit: &Visit) {}

    fn visit_closed(&self, _visit: &Visit) {}
}

/// Creates the production observer.
pub fn tracing_observer() -> SharedObserver {
    Arc::new(TracingObserver)
}
