use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::MetricsSnapshot;

/// Counters shared by every ingestion worker.
#[derive(Debug)]
pub struct IngestMetrics {
    started_at: Instant,
    received: AtomicU64,
    acknowledged: AtomicU64,
    requeued: AtomicU64,
    dropped: AtomicU64,
    visits_opened: AtomicU64,
    visits_closed: AtomicU64,
}

impl Default for IngestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            received: AtomicU64::new(0),
            acknowledged: AtomicU64::new(0),
            requeued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            visits_opened: AtomicU64::new(0),
            visits_closed: AtomicU64::new(0),
        }
    }

    pub fn message_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_acknowledged(&self) {
        self.acknowledged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the visit transitions of one processed event.
    pub fn visits_changed(&self, opened: usize, closed: usize) {
        self.visits_opened
            .fetch_add(opened as u64, Ordering::Relaxed);
        self.visits_closed
            .fetch_add(closed as u64, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime: self.started_at.elapsed(),
            received: self.received.load(Ordering::Relaxed),
            acknowledged: self.acknowledged.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            visits_opened: self.visits_opened.load(Ordering::Relaxed),
            visits_closed: self.visits_closed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_metrics_start_at_zero() {
        let snapshot = IngestMetrics::new().snapshot();
        assert_eq!(snapshot.received, 0);
        assert_eq!(snapshot.settled(), 0);
    }

    #[test]
    fn test_counters_from_many_threads() {
        let metrics = Arc::new(IngestMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.message_received();
                        metrics.message_acknowledged();
                    }
                    metrics.visits_changed(2, 1);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.received, 400);
        assert_eq!(snapshot.acknowledged, 400);
        assert_eq!(snapshot.visits_opened, 8);
        assert_eq!(snapshot.visits_closed, 4);
    }
}
