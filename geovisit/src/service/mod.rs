//! Query and command surface over the stores.
//!
//! [`TrackingService`] is what an HTTP layer (or the CLI) calls. It records
//! positions, answers visit and zone queries, serves the significant-position
//! view through the [`QueryCache`], and offers a synchronous containment check
//! that drives the same [`VisitTracker`] as the event pipeline.

mod error;

pub use error::QueryError;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{QueryCache, QueryKey};
use crate::model::{
    trusted_time, EntityId, LocationEvent, Position, TimeRange, Visit, VisitKey, ZoneId,
};
use crate::observer::SharedObserver;
use crate::significance::{filter_significant, SignificanceConfig};
use crate::store::{Stores, VisitFilter};
use crate::transport::Publisher;
use crate::visit::{Transition, VisitTracker};
use crate::zone::{NewZone, Zone, ZoneCatalog};

/// Result of [`TrackingService::check_containment`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainmentResult {
    pub inside: bool,
    /// Distance from the zone center to the entity's latest position.
    pub distance_m: f64,
    /// Visit change caused by this check.
    #[serde(skip)]
    pub transition: Transition,
}

/// Shared components the service is built from.
pub struct ServiceParts {
    pub stores: Stores,
    pub catalog: Arc<ZoneCatalog>,
    pub tracker: Arc<VisitTracker>,
    pub cache: Arc<QueryCache>,
    pub observer: SharedObserver,
    pub significance: SignificanceConfig,
    /// How far ahead of the server clock a caller-supplied time may be.
    pub max_clock_skew: Duration,
}

/// Query/API operations.
pub struct TrackingService {
    stores: Stores,
    catalog: Arc<ZoneCatalog>,
    tracker: Arc<VisitTracker>,
    cache: Arc<QueryCache>,
    observer: SharedObserver,
    significance: SignificanceConfig,
    max_clock_skew: chrono::Duration,
    publisher: Option<Arc<dyn Publisher>>,
}

impl TrackingService {
    pub fn new(parts: ServiceParts) -> Self {
        Self {
            stores: parts.stores,
            catalog: parts.catalog,
            tracker: parts.tracker,
            cache: parts.cache,
            observer: parts.observer,
            significance: parts.significance,
            max_clock_skew: chrono::Duration::from_std(parts.max_clock_skew)
                .unwrap_or_else(|_| chrono::Duration::zero()),
            publisher: None,
        }
    }

    /// Publishes a location event for every recorded position.
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Stores a position report and announces it to the pipeline.
    ///
    /// `observed_at` defaults to now, and so does a time too far in the future
    /// (the same rule the event pipeline applies). A failed publish is logged only: the
    /// position is already stored and visible to queries.
    pub async fn record_position(
        &self,
        entity_id: EntityId,
        latitude: f64,
        longitude: f64,
        observed_at: Option<DateTime<Utc>>,
    ) -> Result<Position, QueryError> {
        let now = Utc::now();
        let claimed = observed_at;
        let observed_at = trusted_time(claimed, now, self.max_clock_skew);
        if let Some(claimed) = claimed.filter(|t| *t != observed_at) {
            self.observer.timestamp_rejected(entity_id, claimed, observed_at);
        }
        let position = Position::new(entity_id, latitude, longitude, observed_at)?;

        self.stores.positions.create_position(position.clone()).await?;
        self.cache.invalidate();

        if let Some(publisher) = &self.publisher {
            match LocationEvent::from_position(&position).encode() {
                Ok(payload) => {
                    if let Err(e) = publisher.publish(payload).await {
                        warn!(entity_id = %entity_id, error = %e, "Failed to publish location event");
                    }
                }
                Err(e) => warn!(entity_id = %entity_id, error = %e, "Failed to encode location event"),
            }
        }

        debug!(entity_id = %entity_id, observed_at = %observed_at, "Position recorded");
        Ok(position)
    }

    /// Most recent position of an entity.
    pub async fn latest_position(&self, entity_id: EntityId) -> Result<Position, QueryError> {
        Ok(self.stores.positions.latest_position(entity_id).await?)
    }

    /// Tests the entity's latest position against a zone and applies the
    /// resulting visit transition.
    pub async fn check_containment(
        &self,
        entity_id: EntityId,
        zone_id: ZoneId,
    ) -> Result<ContainmentResult, QueryError> {
        let zone = self.stores.zones.zone(zone_id).await?;
        let position = self.stores.positions.latest_position(entity_id).await?;

        let distance_m = zone.distance_from_center(position.latitude, position.longitude);
        let inside = zone.contains(position.latitude, position.longitude);
        let transition = self
            .tracker
            .observe(VisitKey::new(entity_id, zone_id), inside, position.observed_at)
            .await?;
        self.observer.containment_checked(entity_id, zone_id, inside);

        Ok(ContainmentResult {
            inside,
            distance_m,
            transition,
        })
    }

    /// Significant positions, optionally restricted to a time window.
    pub async fn list_significant_positions(
        &self,
        range: Option<TimeRange>,
    ) -> Result<Vec<Position>, QueryError> {
        let key = QueryKey::from(range);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let generation = self.cache.generation();
        let positions = match range {
            Some(range) => {
                self.stores
                    .positions
                    .positions_between(range.from, range.to)
                    .await?
            }
            None => self.stores.positions.all_positions().await?,
        };
        let significant = filter_significant(&positions, &self.significance);
        debug!(
            input = positions.len(),
            output = significant.len(),
            "Significant positions computed"
        );

        self.cache
            .put_if_generation(key, significant.clone(), generation);
        Ok(significant)
    }

    pub async fn list_visits(&self, filter: VisitFilter) -> Result<Vec<Visit>, QueryError> {
        Ok(self.stores.visits.visits(filter).await?)
    }

    /// Like [`Self::list_visits`], from raw `key=value` query parameters.
    pub async fn list_visits_by_query<'a, I>(&self, pairs: I) -> Result<Vec<Visit>, QueryError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let filter = VisitFilter::from_query_pairs(pairs)?;
        self.list_visits(filter).await
    }

    /// Validates and stores a zone; the pipeline sees it on its next event.
    pub async fn create_zone(&self, zone: NewZone) -> Result<Zone, QueryError> {
        zone.validate()?;
        let zone = self.stores.zones.create_zone(zone).await?;
        self.catalog.invalidate();
        Ok(zone)
    }

    pub async fn list_zones(&self) -> Result<Vec<Zone>, QueryError> {
        Ok(self.stores.zones.all_zones().await?)
    }

    pub async fn zone(&self, zone_id: ZoneId) -> Result<Zone, QueryError> {
        Ok(self.stores.zones.zone(zone_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::observer::NoopObserver;
    use crate::processor::DEFAULT_MAX_CLOCK_SKEW;
    use crate::store::MemoryStore;
    use crate::transport::{MemoryQueue, Transport};
    use crate::zone::ZoneCatalogConfig;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn service(store: &Arc<MemoryStore>) -> TrackingService {
        let stores = Stores::shared(store.clone());
        let observer: SharedObserver = Arc::new(NoopObserver);
        TrackingService::new(ServiceParts {
            catalog: Arc::new(ZoneCatalog::new(
                stores.zones.clone(),
                ZoneCatalogConfig::default(),
            )),
            tracker: Arc::new(VisitTracker::new(stores.visits.clone(), observer.clone())),
            cache: Arc::new(QueryCache::new(CacheConfig::default())),
            stores,
            observer,
            significance: SignificanceConfig::default(),
            max_clock_skew: DEFAULT_MAX_CLOCK_SKEW,
        })
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_record_position_validates_and_publishes() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::default());
        let svc = service(&store).with_publisher(queue.clone());

        let err = svc
            .record_position(EntityId(1), 95.0, 0.0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidInput(_)));

        let position = svc
            .record_position(EntityId(1), 1.0, 2.0, Some(t0()))
            .await
            .unwrap();
        assert_eq!(svc.latest_position(EntityId(1)).await.unwrap(), position);

        let delivery = queue.receive().await.unwrap().unwrap();
        let event = LocationEvent::decode(&delivery.payload).unwrap();
        assert_eq!(event.entity_id, EntityId(1));
        assert_eq!(event.occurred_at, Some(t0()));
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_record() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::default());
        queue.close();
        let svc = service(&store).with_publisher(queue);

        assert!(svc
            .record_position(EntityId(1), 1.0, 2.0, None)
            .await
            .is_ok());
        assert_eq!(store.position_count(), 1);
    }

    #[tokio::test]
    async fn test_check_containment_drives_visits() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let zone = svc
            .create_zone(NewZone::new("Office", 0.0, 0.0, 100.0))
            .await
            .unwrap();

        assert_eq!(
            svc.check_containment(EntityId(1), zone.id).await.unwrap_err(),
            QueryError::NotFound("position")
        );
        assert_eq!(
            svc.check_containment(EntityId(1), ZoneId(99)).await.unwrap_err(),
            QueryError::NotFound("zone")
        );

        svc.record_position(EntityId(1), 0.0, 0.0, Some(t0()))
            .await
            .unwrap();
        let result = svc.check_containment(EntityId(1), zone.id).await.unwrap();
        assert!(result.inside);
        assert!(matches!(result.transition, Transition::Opened(_)));

        // Asking again is a no-op
        let again = svc.check_containment(EntityId(1), zone.id).await.unwrap();
        assert_eq!(again.transition, Transition::Unchanged);

        svc.record_position(EntityId(1), 0.01, 0.0, Some(t0() + ChronoDuration::minutes(7)))
            .await
            .unwrap();
        let left = svc.check_containment(EntityId(1), zone.id).await.unwrap();
        assert!(!left.inside);
        assert!(left.distance_m > 1_000.0);
        match left.transition {
            Transition::Closed(visit) => assert_eq!(visit.duration_seconds, 420),
            other => panic!("expected close, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_significant_positions_are_cached_until_write() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        for minutes in [0, 5, 10, 15, 20] {
            let at = t0() + ChronoDuration::minutes(minutes);
            svc.record_position(EntityId(1), 0.0, 0.0, Some(at))
                .await
                .unwrap();
        }

        let first = svc.list_significant_positions(None).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(svc.cache().len(), 1);
        assert_eq!(svc.list_significant_positions(None).await.unwrap(), first);
        assert_eq!(svc.cache().stats().hits, 1);

        svc.record_position(EntityId(2), 5.0, 5.0, Some(t0()))
            .await
            .unwrap();
        assert!(svc.cache().is_empty());
        assert_eq!(svc.list_significant_positions(None).await.unwrap().len(), 2);

        let range = TimeRange::new(
            t0() + ChronoDuration::minutes(15),
            t0() + ChronoDuration::minutes(20),
        )
        .unwrap();
        let windowed = svc.list_significant_positions(Some(range)).await.unwrap();
        assert_eq!(windowed.len(), 2, "two-point trail returned as is");
    }

    #[tokio::test]
    async fn test_zone_and_visit_queries() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);

        assert!(matches!(
            svc.create_zone(NewZone::new("", 0.0, 0.0, 10.0)).await,
            Err(QueryError::InvalidInput(_))
        ));
        let zone = svc
            .create_zone(NewZone::new("Lab", 0.0, 0.0, 10.0))
            .await
            .unwrap();
        assert_eq!(svc.zone(zone.id).await.unwrap(), zone);
        assert_eq!(svc.list_zones().await.unwrap().len(), 1);

        svc.record_position(EntityId(3), 0.0, 0.0, None).await.unwrap();
        svc.check_containment(EntityId(3), zone.id).await.unwrap();

        let visits = svc
            .list_visits_by_query([("user_id", "3"), ("checkpoint_id", "")])
            .await
            .unwrap();
        assert_eq!(visits.len(), 1);
        assert!(svc
            .list_visits(VisitFilter::all().with_entity(EntityId(4)))
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            svc.list_visits_by_query([("name", "x")]).await,
            Err(QueryError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_future_observed_at_is_clamped_to_now() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let zone = svc
            .create_zone(NewZone::new("Yard", 0.0, 0.0, 100.0))
            .await
            .unwrap();

        let future = Utc::now() + ChronoDuration::days(3);
        let recorded = svc
            .record_position(EntityId(1), 0.0, 0.0, Some(future))
            .await
            .unwrap();
        assert!(recorded.observed_at < future);
        assert!(recorded.observed_at <= Utc::now());
        svc.check_containment(EntityId(1), zone.id).await.unwrap();

        // A later, honest report still closes the visit
        svc.record_position(EntityId(1), 0.01, 0.0, Some(Utc::now()))
            .await
            .unwrap();
        let left = svc.check_containment(EntityId(1), zone.id).await.unwrap();
        match left.transition {
            Transition::Closed(visit) => assert!(visit.end_at.unwrap() >= visit.start_at),
            other => panic!("expected close, got {:?}", other),
        }
    }
}
