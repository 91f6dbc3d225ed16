//! Application bootstrap implementation.
//!
//! `GeoVisitApp` wires the components in dependency order and owns the
//! background tasks: the ingestion workers and the query cache sweeper.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::config::AppConfig;
use super::error::AppError;
use crate::cache::QueryCache;
use crate::ingest::{join_workers, spawn_workers, IngestError};
use crate::observer::{tracing_observer, SharedObserver};
use crate::processor::EventProcessor;
use crate::service::{ServiceParts, TrackingService};
use crate::store::Stores;
use crate::telemetry::{IngestMetrics, MetricsSnapshot};
use crate::transport::{Publisher, Transport};
use crate::visit::VisitTracker;
use crate::zone::ZoneCatalog;

/// GeoVisit application with service lifecycle management.
///
/// Components are started in this order:
/// 1. Zone catalog (the zone store must answer once, or startup fails)
/// 2. Visit tracker and event processor
/// 3. Query cache, its expiry sweeper, and the tracking service
/// 4. Ingestion workers on the transport
///
/// The service shares the tracker with the workers, so a containment check
/// and an event for the same (entity, zone) pair are serialized.
///
/// # Example
///
/// ```ignore
/// use geovisit::app::{AppConfig, GeoVisitApp};
///
/// let app = GeoVisitApp::start(AppConfig::default(), stores, queue).await?;
///
/// let zones = app.service().list_zones().await?;
///
/// // Later: graceful shutdown
/// app.shutdown().await?;
/// ```
pub struct GeoVisitApp {
    service: Arc<TrackingService>,
    metrics: Arc<IngestMetrics>,
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<Result<(), IngestError>>>,
    sweeper: Option<JoinHandle<()>>,
}

impl GeoVisitApp {
    /// Start the application with the tracing observer and no publisher.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the zone store cannot be read.
    pub async fn start(
        config: AppConfig,
        stores: Stores,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, AppError> {
        Self::start_with(config, stores, transport, tracing_observer(), None).await
    }

    /// Start the application with a custom observer and an optional
    /// publisher for positions recorded through the service.
    pub async fn start_with(
        config: AppConfig,
        stores: Stores,
        transport: Arc<dyn Transport>,
        observer: SharedObserver,
        publisher: Option<Arc<dyn Publisher>>,
    ) -> Result<Self, AppError> {
        let catalog = Arc::new(ZoneCatalog::new(stores.zones.clone(), config.catalog.clone()));
        let zones = catalog.zones().await?;
        info!(zones = zones.len(), "Zone catalog loaded");

        let tracker = Arc::new(VisitTracker::new(stores.visits.clone(), observer.clone()));
        let processor = Arc::new(EventProcessor::new(
            Arc::clone(&catalog),
            Arc::clone(&tracker),
            observer.clone(),
            config.processor.clone(),
        ));

        let shutdown = CancellationToken::new();
        let cache = Arc::new(QueryCache::new(config.cache.clone()));
        let sweeper = spawn_sweeper(Arc::clone(&cache), config.cache.ttl, shutdown.clone());

        let mut service = TrackingService::new(ServiceParts {
            stores,
            catalog,
            tracker,
            cache,
            observer,
            significance: config.significance.clone(),
            max_clock_skew: config.processor.max_clock_skew,
        });
        if let Some(publisher) = publisher {
            service = service.with_publisher(publisher);
        }

        let metrics = Arc::new(IngestMetrics::new());
        let workers = spawn_workers(
            &config.ingest,
            transport,
            processor,
            Arc::clone(&metrics),
            &shutdown,
        );
        info!(workers = workers.len(), "GeoVisit started");

        Ok(Self {
            service: Arc::new(service),
            metrics,
            shutdown,
            workers,
            sweeper,
        })
    }

    /// The query/API surface.
    pub fn service(&self) -> Arc<TrackingService> {
        Arc::clone(&self.service)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Token that stops the workers when cancelled (e.g. from a signal handler).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Waits for the workers to finish on their own, i.e. when the transport
    /// closes or fails, then stops the background tasks.
    pub async fn wait(mut self) -> Result<(), AppError> {
        let result = join_workers(std::mem::take(&mut self.workers)).await;
        self.stop_background().await;
        result.map_err(AppError::from)
    }

    /// Graceful shutdown.
    ///
    /// In-flight deliveries are settled before their worker exits. Returns the
    /// first fatal worker error, if any worker failed before shutdown.
    pub async fn shutdown(mut self) -> Result<(), AppError> {
        info!("Shutting down GeoVisit");
        self.shutdown.cancel();
        let result = join_workers(std::mem::take(&mut self.workers)).await;
        self.stop_background().await;
        result.map_err(AppError::from)
    }

    async fn stop_background(&mut self) {
        self.shutdown.cancel();
        if let Some(sweeper) = self.sweeper.take() {
            if let Err(e) = sweeper.await {
                debug!(error = %e, "Cache sweeper ended abnormally");
            }
        }
        info!(metrics = %self.metrics.snapshot(), "GeoVisit stopped");
    }
}

impl Drop for GeoVisitApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Periodically drops expired query results. `None` when caching is off.
fn spawn_sweeper(
    cache: Arc<QueryCache>,
    ttl: Duration,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if ttl.is_zero() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(ttl);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let purged = cache.purge_expired();
                    if purged > 0 {
                        debug!(purged, "Expired query results purged");
                    }
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityId;
    use crate::observer::NoopObserver;
    use crate::store::{MemoryStore, StoreError, ZoneStore};
    use crate::transport::{MemoryQueue, TransportError};
    use crate::zone::NewZone;

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let store = Arc::new(MemoryStore::new());
        store
            .create_zone(NewZone::new("Depot", 0.0, 0.0, 50.0))
            .await
            .unwrap();
        let queue = Arc::new(MemoryQueue::default());

        let app = GeoVisitApp::start(
            AppConfig::default().with_workers(2),
            Stores::shared(store),
            queue,
        )
        .await
        .unwrap();
        assert_eq!(app.service().list_zones().await.unwrap().len(), 1);
        assert_eq!(app.metrics().received, 0);

        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_returns_when_transport_closes() {
        let queue = Arc::new(MemoryQueue::default());
        let app = GeoVisitApp::start(
            AppConfig::default(),
            Stores::shared(Arc::new(MemoryStore::new())),
            queue.clone(),
        )
        .await
        .unwrap();

        queue.close();
        app.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_reports_transport_failure() {
        let queue = Arc::new(MemoryQueue::default());
        let app = GeoVisitApp::start(
            AppConfig::default(),
            Stores::shared(Arc::new(MemoryStore::new())),
            queue.clone(),
        )
        .await
        .unwrap();

        queue.break_connection("broker restarted");
        let err = app.wait().await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Ingest(IngestError::Transport {
                source: TransportError::ConnectionLost(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_recorded_positions_reach_the_pipeline() {
        let store = Arc::new(MemoryStore::new());
        store
            .create_zone(NewZone::new("Depot", 0.0, 0.0, 50.0))
            .await
            .unwrap();
        let queue = Arc::new(MemoryQueue::default());

        let app = GeoVisitApp::start_with(
            AppConfig::default(),
            Stores::shared(store.clone()),
            queue.clone(),
            Arc::new(NoopObserver),
            Some(queue.clone()),
        )
        .await
        .unwrap();

        app.service()
            .record_position(EntityId(7), 0.0, 0.0, None)
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while store.active_visit_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        app.shutdown().await.unwrap();
        assert_eq!(store.visit_count(), 1);
    }

    #[test]
    fn test_store_error_is_store_variant() {
        let err = AppError::from(StoreError::Backend("down".into()));
        assert!(err.to_string().contains("Store unavailable"));
    }
}
