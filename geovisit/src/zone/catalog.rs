//! Zone catalog snapshot shared by the event processors.
//!
//! With the default refresh interval of zero every call goes to the store, so
//! zones created while the service runs are picked up by the very next event.
//! A positive interval serves a shared snapshot until it is that old.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use super::Zone;
use crate::store::{StoreError, ZoneStore};

/// Configuration for [`ZoneCatalog`].
#[derive(Debug, Clone, Default)]
pub struct ZoneCatalogConfig {
    /// How long a fetched zone list is reused. Zero disables reuse.
    pub refresh: Duration,
}

impl ZoneCatalogConfig {
    pub fn with_refresh(mut self, refresh: Duration) -> Self {
        self.refresh = refresh;
        self
    }
}

/// Read-through view of all zones.
pub struct ZoneCatalog {
    store: Arc<dyn ZoneStore>,
    config: ZoneCatalogConfig,
    snapshot: RwLock<Option<(Instant, Arc<[Zone]>)>>,
}

impl ZoneCatalog {
    pub fn new(store: Arc<dyn ZoneStore>, config: ZoneCatalogConfig) -> Self {
        Self {
            store,
            config,
            snapshot: RwLock::new(None),
        }
    }

    /// Returns the current zone list, refetching when the snapshot is stale.
    pub async fn zones(&self) -> Result<Arc<[Zone]>, StoreError> {
        if let Some(zones) = self.fresh_snapshot() {
            return Ok(zones);
        }

        let zones: Arc<[Zone]> = self.store.all_zones().await?.into();
        debug!(count = zones.len(), "Zone catalog fetched");

        if !self.config.refresh.is_zero() {
            *self.snapshot.write() = Some((Instant::now(), Arc::clone(&zones)));
        }
        Ok(zones)
    }

    fn fresh_snapshot(&self) -> Option<Arc<[Zone]>> {
        if self.config.refresh.is_zero() {
            return None;
        }
        let guard = self.snapshot.read();
        let (fetched_at, zones) = guard.as_ref()?;
        (fetched_at.elapsed() < self.config.refresh).then(|| Arc::clone(zones))
    }

    /// Drops the snapshot so the next call hits the store.
    pub fn invalidate(&self) {
        self.snapshot.write().take();
    }
}
