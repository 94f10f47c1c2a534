use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::connection::ConnectionEvent;

use super::{Broker, BrokerError, Delivery};

/// In-process broker for tests: `publish` feeds the first receiver
/// registered with `consume` for that destination (single-consumer queue
/// semantics); `publish_fanout`/`publish_exchange` feed every receiver
/// registered under that name (broadcast, matching a real fanout/declared
/// exchange with multiple bound queues). Publishing before a consumer has
/// subscribed silently drops the message. Never disconnects, so
/// `connection_events` returns an already-closed channel.
#[derive(Default)]
pub struct InMemoryBroker {
    senders: Mutex<HashMap<String, Vec<mpsc::Sender<Delivery>>>>,
}

impl InMemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn broadcast(&self, name: &str, payload: &[u8]) {
        let senders = self.senders.lock().unwrap().get(name).cloned().unwrap_or_default();
        for sender in senders {
            let _ = sender.send(Delivery::new(payload.to_vec(), || {})).await;
        }
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let sender = self.senders.lock().unwrap().get(destination).and_then(|v| v.first()).cloned();
        if let Some(sender) = sender {
            let _ = sender.send(Delivery::new(payload.to_vec(), || {})).await;
        }
        Ok(())
    }

    async fn publish_fanout(&self, exchange: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.broadcast(exchange, payload).await;
        Ok(())
    }

    async fn publish_exchange(
        &self,
        exchange: &str,
        _kind: &str,
        _options: &Map<String, Value>,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        self.broadcast(exchange, payload).await;
        Ok(())
    }

    async fn consume(&self, queue: &str, _prefetch: u16) -> Result<mpsc::Receiver<Delivery>, BrokerError> {
        let (tx, rx) = mpsc::channel(1024);
        self.senders.lock().unwrap().entry(queue.to_string()).or_default().push(tx);
        Ok(rx)
    }

    async fn cancel_consumers(&self, queue: &str) -> Result<(), BrokerError> {
        self.senders.lock().unwrap().remove(queue);
        Ok(())
    }

    fn connection_events(&self) -> mpsc::Receiver<ConnectionEvent> {
        mpsc::channel(1).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscribed_consumer() {
        let broker = InMemoryBroker::new();
        let mut rx = broker.consume("results", 1).await.unwrap();
        broker.publish("results", b"hello").await.unwrap();
        let delivery = rx.recv().await.unwrap();
        assert_eq!(delivery.payload, b"hello");
    }

    #[tokio::test]
    async fn publish_with_no_consumer_is_dropped_quietly() {
        let broker = InMemoryBroker::new();
        broker.publish("nowhere", b"x").await.unwrap();
    }

    #[tokio::test]
    async fn publish_fanout_reaches_every_bound_consumer() {
        let broker = InMemoryBroker::new();
        let mut a = broker.consume("agents", 1).await.unwrap();
        let mut b = broker.consume("agents", 1).await.unwrap();
        broker.publish_fanout("agents", b"ping").await.unwrap();
        assert_eq!(a.recv().await.unwrap().payload, b"ping");
        assert_eq!(b.recv().await.unwrap().payload, b"ping");
    }

    #[tokio::test]
    async fn cancel_consumers_drops_existing_subscription() {
        let broker = InMemoryBroker::new();
        let mut rx = broker.consume("keepalives", 1).await.unwrap();
        broker.cancel_consumers("keepalives").await.unwrap();
        broker.publish("keepalives", b"x").await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
