//! In-process durable queue with acknowledgement tracking.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use super::{Delivery, DeliveryTag, Publisher, Transport, TransportError, DEFAULT_QUEUE_NAME};
use crate::store::BoxFuture;

#[derive(Debug)]
struct Message {
    payload: Vec<u8>,
    redelivered: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Message>,
    unacked: HashMap<DeliveryTag, Vec<u8>>,
    next_tag: DeliveryTag,
    closed: bool,
    lost: Option<String>,
}

/// FIFO queue implementing both [`Transport`] and [`Publisher`].
///
/// Delivered messages stay tracked by tag until they are acknowledged or
/// rejected. A requeued message goes to the back of the queue and is flagged
/// as redelivered. After [`MemoryQueue::close`] consumers drain what is left,
/// then `receive` returns `Ok(None)`.
#[derive(Debug)]
pub struct MemoryQueue {
    name: String,
    state: Mutex<QueueState>,
    available: Notify,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_NAME)
    }
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
            available: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops accepting publishes; consumers finish the backlog and stop.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_waiters();
        debug!(queue = %self.name, "Queue closed");
    }

    /// Simulates an unrecoverable connection failure for every consumer.
    pub fn break_connection(&self, reason: impl Into<String>) {
        self.state.lock().lost = Some(reason.into());
        self.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Messages waiting to be delivered.
    pub fn ready_len(&self) -> usize {
        self.state.lock().ready.len()
    }

    /// Messages delivered but not yet acknowledged or rejected.
    pub fn unacked_len(&self) -> usize {
        self.state.lock().unacked.len()
    }

    fn try_receive(&self) -> Option<Result<Option<Delivery>, TransportError>> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.lost {
            return Some(Err(TransportError::ConnectionLost(reason.clone())));
        }
        if let Some(message) = state.ready.pop_front() {
            state.next_tag += 1;
            let tag = state.next_tag;
            state.unacked.insert(tag, message.payload.clone());
            return Some(Ok(Some(Delivery {
                tag,
                payload: message.payload,
                redelivered: message.redelivered,
            })));
        }
        if state.closed {
            return Some(Ok(None));
        }
        None
    }

    fn settle(&self, tag: DeliveryTag, requeue: bool) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.lost {
            return Err(TransportError::ConnectionLost(reason.clone()));
        }
        let payload = state
            .unacked
            .remove(&tag)
            .ok_or(TransportError::UnknownDelivery(tag))?;
        if requeue {
            state.ready.push_back(Message {
                payload,
                redelivered: true,
            });
            drop(state);
            self.available.notify_one();
        }
        Ok(())
    }
}

impl Transport for MemoryQueue {
    fn receive(&self) -> BoxFuture<'_, Result<Option<Delivery>, TransportError>> {
        Box::pin(async move {
            loop {
                // Register interest before looking so a concurrent publish is not missed
                let notified = self.available.notified();
                if let Some(result) = self.try_receive() {
                    return result;
                }
                notified.await;
            }
        })
    }

    fn ack(&self, tag: DeliveryTag) -> BoxFuture<'_, Result<(), TransportError>> {
        let result = self.settle(tag, false);
        Box::pin(async move { result })
    }

    fn nack(&self, tag: DeliveryTag, requeue: bool) -> BoxFuture<'_, Result<(), TransportError>> {
        let result = self.settle(tag, requeue);
        Box::pin(async move { result })
    }
}

impl Publisher for MemoryQueue {
    fn publish(&self, payload: Vec<u8>) -> BoxFuture<'_, Result<(), TransportError>> {
        let result = {
            let mut state = self.state.lock();
            if state.closed {
                Err(TransportError::Closed)
            } else {
                state.ready.push_back(Message {
                    payload,
                    redelivered: false,
                });
                Ok(())
            }
        };
        if result.is_ok() {
            self.available.notify_one();
        }
        Box::pin(async move { result })
    }
}
