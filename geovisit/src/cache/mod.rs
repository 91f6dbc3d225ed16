//! Time-limited memo of significant-position query results.
//!
//! Entries are keyed by query shape ([`QueryKey`]) and live for a fixed TTL.
//! Any position write invalidates the whole cache. Reads hand out copies, so
//! callers can never mutate a cached result.
//!
//! # Stale writes
//!
//! A query reads positions, filters them, then stores the result. If a write
//! invalidates the cache in between, that result is already stale. Callers
//! take [`QueryCache::generation`] before reading and store with
//! [`QueryCache::put_if_generation`], which discards the result when the
//! generation has moved on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::model::{Position, TimeRange};

/// Default time-to-live of a cached result.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// The query shape a cached result answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    All,
    Between {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl From<Option<TimeRange>> for QueryKey {
    fn from(range: Option<TimeRange>) -> Self {
        match range {
            Some(range) => QueryKey::Between {
                from: range.from,
                to: range.to,
            },
            None => QueryKey::All,
        }
    }
}

/// Configuration for [`QueryCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub generation: u64,
}

#[derive(Debug)]
struct Entry {
    stored_at: Instant,
    positions: Vec<Position>,
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<QueryKey, Entry>,
    ttl: Duration,
    generation: u64,
}

impl CacheState {
    fn is_fresh(&self, entry: &Entry) -> bool {
        entry.stored_at.elapsed() < self.ttl
    }
}

/// Reader/writer-locked query result cache.
#[derive(Debug)]
pub struct QueryCache {
    state: RwLock<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            state: RwLock::new(CacheState {
                entries: HashMap::new(),
                ttl: config.ttl,
                generation: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A copy of the cached result, if present and younger than the TTL.
    pub fn get(&self, key: &QueryKey) -> Option<Vec<Position>> {
        let state = self.state.read();
        let found = state
            .entries
            .get(key)
            .filter(|entry| state.is_fresh(entry))
            .map(|entry| entry.positions.clone());
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Current invalidation generation.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Stores a result only if no invalidation happened since `generation`
    /// was read. Returns whether the result was stored.
    pub fn put_if_generation(
        &self,
        key: QueryKey,
        positions: Vec<Position>,
        generation: u64,
    ) -> bool {
        let mut state = self.state.write();
        if state.generation != generation {
            debug!(?key, "Discarding query result computed before invalidation");
            return false;
        }
        state.entries.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                positions,
            },
        );
        true
    }

    /// Drops every entry.
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        state.generation += 1;
        state.entries.clear();
    }

    /// Removes entries older than the TTL; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.state.write();
        let ttl = state.ttl;
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| entry.stored_at.elapsed() < ttl);
        before - state.entries.len()
    }

    /// Replaces the TTL and drops every entry.
    pub fn set_ttl(&self, ttl: Duration) {
        let mut state = self.state.write();
        state.ttl = ttl;
        state.generation += 1;
        state.entries.clear();
    }

    pub fn ttl(&self) -> Duration {
        self.state.read().ttl
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: state.entries.len(),
            generation: state.generation,
        }
    }
}
