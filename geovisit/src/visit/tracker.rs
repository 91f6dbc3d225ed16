//! Applies observations to the visit store, one pair at a time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use super::state::{decide, Step, Transition, VisitState};
use crate::model::{NewVisit, VisitKey};
use crate::observer::SharedObserver;
use crate::store::{StoreError, StoreResult, VisitStore};

/// Drives the visit state machine against a [`VisitStore`].
///
/// State is never cached here: every observation re-reads the active visit,
/// so replaying an observation sees what the first run wrote. The
/// read-decide-write sequence for a pair runs under a per-pair async mutex;
/// pairs that are not contended never wait on each other.
///
/// A create that fails with [`StoreError::Conflict`] means another writer
/// opened the visit first and is reported as [`Transition::Unchanged`].
/// Every other store error is returned unmodified.
pub struct VisitTracker {
    store: Arc<dyn VisitStore>,
    observer: SharedObserver,
    locks: DashMap<VisitKey, Arc<Mutex<()>>>,
}

impl VisitTracker {
    pub fn new(store: Arc<dyn VisitStore>, observer: SharedObserver) -> Self {
        Self {
            store,
            observer,
            locks: DashMap::new(),
        }
    }

    /// Current derived state of a pair.
    pub async fn state(&self, key: VisitKey) -> StoreResult<VisitState> {
        Ok(self.store.active_visit(key).await?.into())
    }

    /// Applies one inside/outside observation made at `at`.
    pub async fn observe(
        &self,
        key: VisitKey,
        inside: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<Transition> {
        let lock = Arc::clone(self.locks.entry(key).or_default().value());
        let result = {
            let _guard = lock.lock().await;
            self.apply(key, inside, at).await
        };
        drop(lock);
        // Only the map holds the mutex now unless another task is waiting on it
        self.locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Number of pairs currently holding a lock entry.
    pub fn locked_pairs(&self) -> usize {
        self.locks.len()
    }

    async fn apply(
        &self,
        key: VisitKey,
        inside: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<Transition> {
        let state = self.state(key).await?;

        match decide(&state, inside) {
            Step::Stay => Ok(Transition::Unchanged),
            Step::Open => {
                let new = NewVisit {
                    entity_id: key.entity_id,
                    zone_id: key.zone_id,
                    start_at: at,
                };
                match self.store.create_visit(new).await {
                    Ok(visit) => {
                        self.observer.visit_opened(&visit);
                        Ok(Transition::Opened(visit))
                    }
                    Err(StoreError::Conflict(_)) => {
                        self.observer.open_conflict(key);
                        Ok(Transition::Unchanged)
                    }
                    Err(e) => Err(e),
                }
            }
            Step::Close(visit) => {
                let closed = visit.closed_at(at);
                self.store.update_visit(closed.clone()).await?;
                self.observer.visit_closed(&closed);
                Ok(Transition::Closed(closed))
            }
        }
    }
}
