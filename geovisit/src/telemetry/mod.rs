//! Ingestion telemetry.
//!
//! Lock-free atomic counters updated by the ingestion workers, read through
//! point-in-time snapshots.
//!
//! ```text
//! IngestionLoop ─────► IngestMetrics ─────► MetricsSnapshot ─────► CLI / logs
//!                      (atomic counters)    (plain copy)
//! ```

mod metrics;
mod snapshot;

pub use metrics::IngestMetrics;
pub use snapshot::MetricsSnapshot;
