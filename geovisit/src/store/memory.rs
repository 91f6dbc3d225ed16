//! In-memory store implementing every persistence trait.
//!
//! Used by the CLI replay command and by tests. Tables sit behind
//! `parking_lot::RwLock`s; all work happens synchronously before the returned
//! future is created, so no lock is ever held across an await point.
//!
//! The visit table keeps an index of active visits per (entity, zone) pair and
//! enforces the conditional insert required by [`VisitStore::create_visit`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use super::{
    BoxFuture, PositionStore, StoreError, StoreResult, VisitFilter, VisitStore, ZoneStore,
};
use crate::model::{EntityId, NewVisit, Position, Visit, VisitId, VisitKey, ZoneId};
use crate::zone::{NewZone, Zone};

/// Planned visit write failures: let `skip` writes through, then fail `fail`.
#[derive(Debug, Default)]
struct FaultPlan {
    skip: usize,
    fail: usize,
}

#[derive(Default)]
struct VisitTable {
    rows: BTreeMap<VisitId, Visit>,
    active: HashMap<VisitKey, VisitId>,
}

/// Thread-safe in-memory implementation of [`ZoneStore`], [`VisitStore`]
/// and [`PositionStore`].
#[derive(Default)]
pub struct MemoryStore {
    zones: RwLock<BTreeMap<ZoneId, Zone>>,
    visits: RwLock<VisitTable>,
    positions: RwLock<Vec<Position>>,
    next_zone_id: AtomicU64,
    next_visit_id: AtomicU64,
    faults: Mutex<FaultPlan>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with zones.
    pub fn with_zones<I>(zones: I) -> Self
    where
        I: IntoIterator<Item = Zone>,
    {
        let store = Self::new();
        {
            let mut table = store.zones.write();
            for zone in zones {
                store.next_zone_id.fetch_max(zone.id.get(), Ordering::Relaxed);
                table.insert(zone.id, zone);
            }
        }
        store
    }

    /// Makes the next `count` visit create/update calls fail with a backend error.
    pub fn fail_next_visit_writes(&self, count: usize) {
        self.fail_visit_writes_after(0, count);
    }

    /// Lets `successes` visit writes through, then fails the following `count`.
    pub fn fail_visit_writes_after(&self, successes: usize, count: usize) {
        *self.faults.lock() = FaultPlan {
            skip: successes,
            fail: count,
        };
    }

    pub fn zone_count(&self) -> usize {
        self.zones.read().len()
    }

    pub fn visit_count(&self) -> usize {
        self.visits.read().rows.len()
    }

    pub fn active_visit_count(&self) -> usize {
        self.visits.read().active.len()
    }

    pub fn position_count(&self) -> usize {
        self.positions.read().len()
    }

    fn take_injected_failure(&self) -> StoreResult<()> {
        let mut plan = self.faults.lock();
        if plan.skip > 0 {
            plan.skip -= 1;
            return Ok(());
        }
        if plan.fail > 0 {
            plan.fail -= 1;
            return Err(StoreError::Backend("injected visit write failure".into()));
        }
        Ok(())
    }

    fn insert_visit(&self, new: NewVisit) -> StoreResult<Visit> {
        self.take_injected_failure()?;
        let key = new.key();
        let mut table = self.visits.write();
        if table.active.contains_key(&key) {
            return Err(StoreError::Conflict(key));
        }
        let id = VisitId(self.next_visit_id.fetch_add(1, Ordering::Relaxed) + 1);
        let visit = Visit::open(id, new);
        table.active.insert(key, id);
        table.rows.insert(id, visit.clone());
        Ok(visit)
    }

    fn replace_visit(&self, visit: Visit) -> StoreResult<()> {
        self.take_injected_failure()?;
        let mut table = self.visits.write();
        let previous = table
            .rows
            .get(&visit.id)
            .ok_or(StoreError::NotFound("visit"))?;
        if previous.key() != visit.key() {
            return Err(StoreError::Invalid(format!(
                "visit {} cannot move from {} to {}",
                visit.id,
                previous.key(),
                visit.key()
            )));
        }

        let key = visit.key();
        if visit.is_active() {
            match table.active.get(&key) {
                Some(active_id) if *active_id != visit.id => {
                    return Err(StoreError::Conflict(key));
                }
                _ => {
                    table.active.insert(key, visit.id);
                }
            }
        } else if table.active.get(&key) == Some(&visit.id) {
            table.active.remove(&key);
        }
        table.rows.insert(visit.id, visit);
        Ok(())
    }
}

impl ZoneStore for MemoryStore {
    fn all_zones(&self) -> BoxFuture<'_, StoreResult<Vec<Zone>>> {
        let zones = self.zones.read().values().cloned().collect();
        Box::pin(async move { Ok(zones) })
    }

    fn zone(&self, id: ZoneId) -> BoxFuture<'_, StoreResult<Zone>> {
        let zone = self
            .zones
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("zone"));
        Box::pin(async move { zone })
    }

    fn create_zone(&self, zone: NewZone) -> BoxFuture<'_, StoreResult<Zone>> {
        // Rejected zones must not consume an id
        let result = zone
            .validate()
            .and_then(|()| {
                let id = ZoneId(self.next_zone_id.fetch_add(1, Ordering::Relaxed) + 1);
                Zone::from_new(id, zone)
            })
            .map_err(|e| StoreError::Invalid(e.to_string()))
            .map(|zone| {
                self.zones.write().insert(zone.id, zone.clone());
                zone
            });
        Box::pin(async move { result })
    }
}

impl VisitStore for MemoryStore {
    fn active_visit(&self, key: VisitKey) -> BoxFuture<'_, StoreResult<Option<Visit>>> {
        let visit = {
            let table = self.visits.read();
            table
                .active
                .get(&key)
                .and_then(|id| table.rows.get(id))
                .cloned()
        };
        Box::pin(async move { Ok(visit) })
    }

    fn create_visit(&self, visit: NewVisit) -> BoxFuture<'_, StoreResult<Visit>> {
        let result = self.insert_visit(visit);
        Box::pin(async move { result })
    }

    fn update_visit(&self, visit: Visit) -> BoxFuture<'_, StoreResult<()>> {
        let result = self.replace_visit(visit);
        Box::pin(async move { result })
    }

    fn visits(&self, filter: VisitFilter) -> BoxFuture<'_, StoreResult<Vec<Visit>>> {
        let visits = self
            .visits
            .read()
            .rows
            .values()
            .filter(|v| filter.matches(v))
            .cloned()
            .collect();
        Box::pin(async move { Ok(visits) })
    }
}

impl PositionStore for MemoryStore {
    fn all_positions(&self) -> BoxFuture<'_, StoreResult<Vec<Position>>> {
        let positions = self.positions.read().clone();
        Box::pin(async move { Ok(positions) })
    }

    fn positions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BoxFuture<'_, StoreResult<Vec<Position>>> {
        let positions = self
            .positions
            .read()
            .iter()
            .filter(|p| from <= p.observed_at && p.observed_at <= to)
            .cloned()
            .collect();
        Box::pin(async move { Ok(positions) })
    }

    fn latest_position(&self, entity_id: EntityId) -> BoxFuture<'_, StoreResult<Position>> {
        let latest = self
            .positions
            .read()
            .iter()
            .filter(|p| p.entity_id == entity_id)
            .max_by_key(|p| p.observed_at)
            .cloned()
            .ok_or(StoreError::NotFound("position"));
        Box::pin(async move { latest })
    }

    fn create_position(&self, position: Position) -> BoxFuture<'_, StoreResult<()>> {
        self.positions.write().push(position);
        Box::pin(async move { Ok(()) })
    }
}
