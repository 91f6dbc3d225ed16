//! Event processor: one location event against every zone.
//!
//! ```text
//! payload ──decode──► LocationEvent ──► ZoneCatalog::zones()
//!                                           │
//!                         for each zone: contains? ──► VisitTracker::observe
//! ```
//!
//! Zones are processed in catalog order and the first failure aborts the
//! event. Transitions already applied for earlier zones stay in place; the
//! transport redelivers the event and those zones replay as no-ops.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, trace};

use crate::geo::CoordError;
use crate::model::{DecodeError, EntityId, LocationEvent, VisitKey, ZoneId};
use crate::observer::SharedObserver;
use crate::store::StoreError;
use crate::visit::{Transition, VisitTracker};
use crate::zone::ZoneCatalog;

/// Default tolerance for event timestamps ahead of the local clock.
pub const DEFAULT_MAX_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// What the transport should do with a message that failed processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Discard the message; redelivery cannot succeed.
    Drop,
    /// Return the message to the queue for another attempt.
    Requeue,
}

/// Errors from processing one event.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("malformed event payload: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("event rejected: {0}")]
    InvalidEvent(#[source] CoordError),

    #[error("zone catalog unavailable: {0}")]
    Catalog(#[source] StoreError),

    #[error("visit update failed for zone {zone_id}: {source}")]
    Store {
        zone_id: ZoneId,
        #[source]
        source: StoreError,
    },
}

impl From<DecodeError> for ProcessError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Json(e) => ProcessError::Malformed(e),
            DecodeError::Coordinates(e) => ProcessError::InvalidEvent(e),
        }
    }
}

impl ProcessError {
    /// Maps the error onto a transport action.
    pub fn disposition(&self) -> Disposition {
        match self {
            ProcessError::Malformed(_) | ProcessError::InvalidEvent(_) => Disposition::Drop,
            ProcessError::Catalog(_) | ProcessError::Store { .. } => Disposition::Requeue,
        }
    }
}

/// Configuration for [`EventProcessor`].
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// How far `occurred_at` may be ahead of the local clock and still be used.
    pub max_clock_skew: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_clock_skew: DEFAULT_MAX_CLOCK_SKEW,
        }
    }
}

impl ProcessorConfig {
    pub fn with_max_clock_skew(mut self, skew: Duration) -> Self {
        self.max_clock_skew = skew;
        self
    }
}

/// Summary of a successfully processed event.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReport {
    pub entity_id: EntityId,
    pub zones_evaluated: usize,
    /// Only the transitions that wrote to the store.
    pub transitions: Vec<Transition>,
}

impl ProcessReport {
    pub fn opened(&self) -> usize {
        self.transitions
            .iter()
            .filter(|t| matches!(t, Transition::Opened(_)))
            .count()
    }

    pub fn closed(&self) -> usize {
        self.transitions
            .iter()
            .filter(|t| matches!(t, Transition::Closed(_)))
            .count()
    }
}

/// Decodes events and drives the visit tracker for every zone.
pub struct EventProcessor {
    catalog: Arc<ZoneCatalog>,
    tracker: Arc<VisitTracker>,
    observer: SharedObserver,
    max_clock_skew: chrono::Duration,
}

impl EventProcessor {
    pub fn new(
        catalog: Arc<ZoneCatalog>,
        tracker: Arc<VisitTracker>,
        observer: SharedObserver,
        config: ProcessorConfig,
    ) -> Self {
        // Out-of-range skews (hundreds of millions of years) disable the allowance
        let max_clock_skew =
            chrono::Duration::from_std(config.max_clock_skew).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            catalog,
            tracker,
            observer,
            max_clock_skew,
        }
    }

    /// Processes one raw transport payload.
    pub async fn process(&self, payload: &[u8]) -> Result<ProcessReport, ProcessError> {
        let event = LocationEvent::decode(payload)?;
        self.process_event(&event).await
    }

    /// Processes an already decoded event.
    pub async fn process_event(
        &self,
        event: &LocationEvent,
    ) -> Result<ProcessReport, ProcessError> {
        let now = Utc::now();
        let at = event.observation_time(now, self.max_clock_skew);
        if let Some(occurred_at) = event.occurred_at.filter(|t| *t != at) {
            self.observer
                .timestamp_rejected(event.entity_id, occurred_at, at);
        }

        let zones = self.catalog.zones().await.map_err(ProcessError::Catalog)?;
        trace!(
            entity_id = %event.entity_id,
            zones = zones.len(),
            observed_at = %at,
            "Processing location event"
        );

        let mut transitions = Vec::new();
        for zone in zones.iter() {
            let inside = zone.contains(event.latitude, event.longitude);
            let key = VisitKey::new(event.entity_id, zone.id);
            let transition = self
                .tracker
                .observe(key, inside, at)
                .await
                .map_err(|source| ProcessError::Store {
                    zone_id: zone.id,
                    source,
                })?;
            if transition.is_change() {
                transitions.push(transition);
            }
        }

        debug!(
            entity_id = %event.entity_id,
            zones = zones.len(),
            changes = transitions.len(),
            "Location event processed"
        );

        Ok(ProcessReport {
            entity_id: event.entity_id,
            zones_evaluated: zones.len(),
            transitions,
        })
    }
}
