use std::fmt;
use std::time::Duration;

/// Point-in-time copy of [`super::IngestMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub received: u64,
    pub acknowledged: u64,
    pub requeued: u64,
    pub dropped: u64,
    pub visits_opened: u64,
    pub visits_closed: u64,
}

impl MetricsSnapshot {
    /// Messages that reached a final ack/nack decision.
    pub fn settled(&self) -> u64 {
        self.acknowledged + self.requeued + self.dropped
    }

    /// Received messages still being processed when the snapshot was taken.
    pub fn in_flight(&self) -> u64 {
        self.received.saturating_sub(self.settled())
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received={} acked={} requeued={} dropped={} opened={} closed={} uptime={}s",
            self.received,
            self.acknowledged,
            self.requeued,
            self.dropped,
            self.visits_opened,
            self.visits_closed,
            self.uptime.as_secs()
        )
    }
}
