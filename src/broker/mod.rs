//! Message broker abstraction (spec §3, §4.5, §4.7).
//!
//! `Broker` covers the two directions this server needs: consuming from a
//! durable queue (`results`, `keepalives`) and publishing to a named
//! exchange or queue (handler `publish`, check-request scheduling). Two
//! backends: [`memory::InMemoryBroker`] for tests, [`amqp::AmqpBroker`]
//! for production.

mod amqp;
mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

pub use amqp::AmqpBroker;
pub use memory::InMemoryBroker;

use crate::connection::ConnectionEvent;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker connection error: {0}")]
    Connection(String),
    #[error("broker publish error: {0}")]
    Publish(String),
    #[error("broker consume error: {0}")]
    Consume(String),
}

/// A raw message pulled off a queue, paired with an acknowledgement handle.
/// Dropping the message without calling [`Delivery::ack`] is equivalent to
/// a nack-and-requeue on the AMQP backend; the in-memory backend has no
/// requeue semantics and just drops it.
pub struct Delivery {
    pub payload: Vec<u8>,
    ack: Option<Box<dyn FnOnce() + Send>>,
}

impl Delivery {
    #[must_use]
    pub fn new(payload: Vec<u8>, ack: impl FnOnce() + Send + 'static) -> Self {
        Self { payload, ack: Some(Box::new(ack)) }
    }

    pub fn ack(mut self) {
        if let Some(ack) = self.ack.take() {
            ack();
        }
    }
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish a payload to a named queue or routing key on the default
    /// exchange.
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Publish to a fanout exchange (spec §4.8: check requests broadcast
    /// to every queue bound to each `check.subscribers` entry). Declares
    /// the exchange if it doesn't already exist and publishes with no
    /// routing key.
    async fn publish_fanout(&self, exchange: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Publish to a named exchange of an arbitrary declared `kind`
    /// (`direct`, `fanout`, `topic`, ...), passing `options` through as
    /// declaration arguments (spec §4.5: the `amqp` handler transport
    /// "declares exchanges of user-supplied type", passing the handler's
    /// remaining exchange keys as declaration options).
    async fn publish_exchange(
        &self,
        exchange: &str,
        kind: &str,
        options: &Map<String, Value>,
        payload: &[u8],
    ) -> Result<(), BrokerError>;

    /// Subscribe to a queue at the given prefetch, returning a channel of
    /// deliveries each carrying its own per-message ack callback. The
    /// reactor drains this channel in its main select loop (spec §5)
    /// rather than blocking a thread on each message. Prefetch is 1 on
    /// both of this crate's subscriptions (spec §5/§6) and must be
    /// re-applied by the caller after every reconnect.
    async fn consume(&self, queue: &str, prefetch: u16) -> Result<mpsc::Receiver<Delivery>, BrokerError>;

    /// Cancel any existing consumers on `queue` (spec §4.7: "before
    /// subscribing, cancels any existing consumers on that queue").
    /// Idempotent: cancelling a queue with no active consumer is not an
    /// error.
    async fn cancel_consumers(&self, queue: &str) -> Result<(), BrokerError>;

    /// Connection lifecycle events (spec §4.9's backend disconnect
    /// policy). Called once by the reactor at startup; backends that
    /// never disconnect (the in-memory test double) may return a channel
    /// whose sender is already dropped.
    fn connection_events(&self) -> mpsc::Receiver<ConnectionEvent>;
}
