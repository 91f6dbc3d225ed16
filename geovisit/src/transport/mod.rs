//! At-least-once message transport boundary.
//!
//! The ingestion loop only needs three things from a queue: receive the next
//! payload, acknowledge it, or reject it with or without redelivery. Producers
//! only need to publish bytes. Broker clients implement [`Transport`] and
//! [`Publisher`]; [`MemoryQueue`] is the in-process implementation.

mod memory;

pub use memory::MemoryQueue;

use thiserror::Error;

use crate::store::BoxFuture;

/// Identifies an unacknowledged delivery on its transport.
pub type DeliveryTag = u64;

/// Default queue name.
pub const DEFAULT_QUEUE_NAME: &str = "location_events";

/// One message handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub payload: Vec<u8>,
    /// True when this payload was delivered before and rejected with requeue.
    pub redelivered: bool,
}

/// Transport failures. All of them are fatal to a consumer loop.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("unknown delivery tag {0}")]
    UnknownDelivery(DeliveryTag),
}

/// Consumer side of a queue.
pub trait Transport: Send + Sync {
    /// Waits for the next message. `Ok(None)` means the transport was shut down
    /// and has nothing left to deliver.
    fn receive(&self) -> BoxFuture<'_, Result<Option<Delivery>, TransportError>>;

    /// Permanently removes a delivered message.
    fn ack(&self, tag: DeliveryTag) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Rejects a delivered message; `requeue` asks for redelivery.
    fn nack(&self, tag: DeliveryTag, requeue: bool) -> BoxFuture<'_, Result<(), TransportError>>;
}

/// Producer side of a queue.
pub trait Publisher: Send + Sync {
    fn publish(&self, payload: Vec<u8>) -> BoxFuture<'_, Result<(), TransportError>>;
}
