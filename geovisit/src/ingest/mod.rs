//! Ingestion loop: transport → event processor → ack/nack.
//!
//! Each loop pulls one delivery at a time and settles it before pulling the
//! next:
//!
//! | Outcome                      | Transport action       |
//! |------------------------------|------------------------|
//! | processed                    | `ack`                  |
//! | malformed / invalid payload  | `nack(requeue=false)`  |
//! | store or catalog failure     | `nack(requeue=true)`   |
//!
//! Redelivery is unbounded. A loop ends when the shutdown token fires, when
//! the transport reports it is closed, or with an [`IngestError`] when the
//! transport itself fails. Shutdown is only observed between messages, so a
//! delivery that is being processed is always settled.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::processor::{Disposition, EventProcessor};
use crate::telemetry::IngestMetrics;
use crate::transport::{Delivery, Transport, TransportError};

/// Default number of concurrent ingestion loops.
pub const DEFAULT_WORKERS: usize = 1;

/// Fatal ingestion failures.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("worker {worker}: transport failed: {source}")]
    Transport {
        worker: usize,
        #[source]
        source: TransportError,
    },

    #[error("worker {worker} terminated abnormally: {reason}")]
    Aborted { worker: usize, reason: String },
}

/// Configuration for the ingestion workers.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Number of loops consuming the same transport.
    pub workers: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

impl IngestConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// One consumer of the transport.
pub struct IngestionLoop {
    worker: usize,
    transport: Arc<dyn Transport>,
    processor: Arc<EventProcessor>,
    metrics: Arc<IngestMetrics>,
}

impl IngestionLoop {
    pub fn new(
        worker: usize,
        transport: Arc<dyn Transport>,
        processor: Arc<EventProcessor>,
        metrics: Arc<IngestMetrics>,
    ) -> Self {
        Self {
            worker,
            transport,
            processor,
            metrics,
        }
    }

    /// Consumes until shutdown, transport close, or a fatal transport error.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), IngestError> {
        info!(worker = self.worker, "Ingestion loop starting");

        loop {
            let received = tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(worker = self.worker, "Ingestion loop shutting down");
                    break;
                }

                received = self.transport.receive() => received,
            };

            match received {
                Ok(Some(delivery)) => {
                    self.handle(delivery).await.map_err(|source| self.fatal(source))?;
                }
                Ok(None) => {
                    info!(worker = self.worker, "Transport closed, ingestion loop ending");
                    break;
                }
                Err(source) => return Err(self.fatal(source)),
            }
        }

        info!(worker = self.worker, "Ingestion loop stopped");
        Ok(())
    }

    async fn handle(&self, delivery: Delivery) -> Result<(), TransportError> {
        self.metrics.message_received();
        let tag = delivery.tag;

        match self.processor.process(&delivery.payload).await {
            Ok(report) => {
                self.transport.ack(tag).await?;
                self.metrics.message_acknowledged();
                self.metrics
                    .visits_changed(report.opened(), report.closed());
                debug!(
                    worker = self.worker,
                    tag,
                    redelivered = delivery.redelivered,
                    entity_id = %report.entity_id,
                    changes = report.transitions.len(),
                    "Message acknowledged"
                );
            }
            Err(e) => match e.disposition() {
                Disposition::Drop => {
                    warn!(
                        worker = self.worker,
                        tag,
                        bytes = delivery.payload.len(),
                        error = %e,
                        "Dropping unprocessable message"
                    );
                    self.transport.nack(tag, false).await?;
                    self.metrics.message_dropped();
                }
                Disposition::Requeue => {
                    warn!(
                        worker = self.worker,
                        tag,
                        redelivered = delivery.redelivered,
                        error = %e,
                        "Processing failed, requeueing message"
                    );
                    self.transport.nack(tag, true).await?;
                    self.metrics.message_requeued();
                }
            },
        }
        Ok(())
    }

    fn fatal(&self, source: TransportError) -> IngestError {
        error!(worker = self.worker, error = %source, "Ingestion loop failed");
        IngestError::Transport {
            worker: self.worker,
            source,
        }
    }
}

/// Spawns `config.workers` loops over one transport.
pub fn spawn_workers(
    config: &IngestConfig,
    transport: Arc<dyn Transport>,
    processor: Arc<EventProcessor>,
    metrics: Arc<IngestMetrics>,
    shutdown: &CancellationToken,
) -> Vec<JoinHandle<Result<(), IngestError>>> {
    (0..config.workers.max(1))
        .map(|worker| {
            let ingestion = IngestionLoop::new(
                worker,
                Arc::clone(&transport),
                Arc::clone(&processor),
                Arc::clone(&metrics),
            );
            tokio::spawn(ingestion.run(shutdown.clone()))
        })
        .collect()
}

/// Waits for spawned loops and returns the first fatal error.
pub async fn join_workers(
    handles: Vec<JoinHandle<Result<(), IngestError>>>,
) -> Result<(), IngestError> {
    let results = futures::future::join_all(handles).await;
    let mut first_error = None;
    for (worker, joined) in results.into_iter().enumerate() {
        let result = joined.unwrap_or_else(|join_error| {
            Err(IngestError::Aborted {
                worker,
                reason: join_error.to_string(),
            })
        });
        if let Err(e) = result {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}
