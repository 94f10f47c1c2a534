use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ExchangeDeclareOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::warn;

use crate::connection::ConnectionEvent;

use super::{Broker, BrokerError, Delivery};

const STATUS_POLL: Duration = Duration::from_secs(2);

/// AMQP-backed broker (spec §3), implemented against `lapin`. No example
/// repo in the retrieval pack depends on an AMQP client; `lapin` is the
/// standard async AMQP crate for a `tokio`-based server and is recorded as
/// a justified addition in the grounding ledger.
pub struct AmqpBroker {
    channel: Channel,
    events: StdMutex<Option<mpsc::Receiver<ConnectionEvent>>>,
}

fn exchange_kind(kind: &str) -> ExchangeKind {
    match kind {
        "fanout" => ExchangeKind::Fanout,
        "topic" => ExchangeKind::Topic,
        "headers" => ExchangeKind::Headers,
        _ => ExchangeKind::Direct,
    }
}

fn declare_options(options: &Map<String, Value>) -> ExchangeDeclareOptions {
    let flag = |key: &str, default: bool| options.get(key).and_then(Value::as_bool).unwrap_or(default);
    ExchangeDeclareOptions {
        durable: flag("durable", true),
        auto_delete: flag("auto_delete", false),
        internal: flag("internal", false),
        nowait: false,
        passive: false,
    }
}

fn consumer_tag(queue: &str) -> String {
    format!("sentrix-{queue}")
}

impl AmqpBroker {
    pub async fn connect(amqp_url: &str) -> Result<Self, BrokerError> {
        let connection = Connection::connect(amqp_url, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        let channel = connection.create_channel().await.map_err(|e| BrokerError::Connection(e.to_string()))?;

        let (tx, rx) = mpsc::channel(32);
        let error_tx = tx.clone();
        connection.on_error(move |err| {
            let _ = error_tx.try_send(ConnectionEvent::Error(err.to_string()));
        });
        spawn_status_watcher(connection, tx);

        Ok(Self { channel, events: StdMutex::new(Some(rx)) })
    }

    async fn declare_and_publish(
        &self,
        exchange: &str,
        kind: ExchangeKind,
        options: ExchangeDeclareOptions,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        self.channel
            .exchange_declare(exchange, kind, options, FieldTable::default())
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;
        self.channel
            .basic_publish(exchange, "", BasicPublishOptions::default(), payload, BasicProperties::default())
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;
        Ok(())
    }
}

/// Polls `connection.status()` for the transitions `lapin`'s `on_error`
/// callback alone can't report (it fires once on the terminal error, not
/// on the later reconnect). Grounded on this crate's own `watchdog.rs`
/// ticking pattern rather than any lapin-internal reconnect hook, since
/// lapin has none.
fn spawn_status_watcher(connection: Connection, tx: mpsc::Sender<ConnectionEvent>) {
    tokio::spawn(async move {
        let mut was_connected = true;
        loop {
            tokio::time::sleep(STATUS_POLL).await;
            let connected = connection.status().connected();
            if was_connected && !connected {
                was_connected = false;
                if tx.send(ConnectionEvent::ReconnectStart).await.is_err() {
                    return;
                }
            } else if !was_connected && connected {
                was_connected = true;
                if tx.send(ConnectionEvent::ReconnectSuccess).await.is_err() {
                    return;
                }
            }
        }
    });
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.channel
            .basic_publish(
                "",
                destination,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default(),
            )
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn publish_fanout(&self, exchange: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let options = ExchangeDeclareOptions { durable: true, ..Default::default() };
        self.declare_and_publish(exchange, ExchangeKind::Fanout, options, payload).await
    }

    async fn publish_exchange(
        &self,
        exchange: &str,
        kind: &str,
        options: &Map<String, Value>,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        self.declare_and_publish(exchange, exchange_kind(kind), declare_options(options), payload).await
    }

    async fn consume(&self, queue: &str, prefetch: u16) -> Result<mpsc::Receiver<Delivery>, BrokerError> {
        self.channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        self.channel
            .queue_declare(queue, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        let mut consumer = self
            .channel
            .basic_consume(queue, &consumer_tag(queue), BasicConsumeOptions::default(), FieldTable::default())
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        let (tx, rx) = mpsc::channel(1024);
        tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                let Ok(delivery) = delivery else {
                    warn!("amqp consumer error on queue");
                    continue;
                };
                let payload = delivery.data.clone();
                let tag = delivery.delivery_tag;
                let channel = delivery.acker.clone();
                let ack = move || {
                    tokio::spawn(async move {
                        if let Err(e) = channel.ack(BasicAckOptions::default()).await {
                            warn!(delivery_tag = tag, error = %e, "failed to ack amqp delivery");
                        }
                    });
                };
                if tx.send(Delivery::new(payload, ack)).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn cancel_consumers(&self, queue: &str) -> Result<(), BrokerError> {
        let tag = consumer_tag(queue);
        if let Err(e) = self.channel.basic_cancel(&tag, BasicCancelOptions::default()).await {
            // No consumer registered under this tag yet is the common case
            // on first startup; log and proceed rather than failing.
            warn!(queue, error = %e, "basic_cancel before subscribe failed, proceeding");
        }
        Ok(())
    }

    fn connection_events(&self) -> mpsc::Receiver<ConnectionEvent> {
        self.events.lock().unwrap().take().unwrap_or_else(|| mpsc::channel(1).1)
    }
}
