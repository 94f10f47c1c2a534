//! Stale-client watchdog (spec §4.10).
//!
//! Loops through the broker rather than calling the processor directly, so
//! synthesized results flow through the same `results` queue as agent
//! results (spec: "so synthetic results flow through the same processor").

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::warn;

use crate::broker::Broker;
use crate::keys;
use crate::model::Client;
use crate::store::StateStore;

const TICK: Duration = Duration::from_secs(30);
const CRITICAL_AFTER_SECS: i64 = 180;
const WARNING_AFTER_SECS: i64 = 120;
const CHECK_NAME: &str = "keepalive";

/// Runs the watchdog loop forever (intended to be spawned as a task).
/// `now_unix` is injected so it can be driven deterministically in tests.
pub async fn run(
    broker: Arc<dyn Broker>,
    store: Arc<dyn StateStore>,
    now_unix: impl Fn() -> i64 + Send + Sync + 'static,
) {
    let mut interval = tokio::time::interval(TICK);
    loop {
        interval.tick().await;
        if let Err(e) = tick_once(broker.as_ref(), store.as_ref(), now_unix()).await {
            warn!(error = %e, "stale-client watchdog tick failed");
        }
    }
}

/// A single watchdog sweep, exposed so callers (and tests) can drive one
/// tick deterministically instead of waiting on the [`run`] loop's timer.
pub async fn tick_once(broker: &dyn Broker, store: &dyn StateStore, now: i64) -> Result<(), crate::error::SentrixError> {
    let names = store.smembers(keys::clients()).await.map_err(|e| crate::error::SentrixError::internal(e.to_string()))?;

    for name in names {
        let Some(raw) = store.get(&keys::client(&name)).await.map_err(|e| crate::error::SentrixError::internal(e.to_string()))? else {
            continue;
        };
        let Ok(client) = serde_json::from_str::<Client>(&raw) else {
            continue;
        };

        let delta = now - client.timestamp;
        let synthesized = if delta >= CRITICAL_AFTER_SECS {
            Some((2, format!("No keep-alive sent from client in over {CRITICAL_AFTER_SECS} seconds")))
        } else if delta >= WARNING_AFTER_SECS {
            Some((1, format!("No keep-alive sent from client in over {WARNING_AFTER_SECS} seconds")))
        } else if store.hexists(&keys::events(&name), CHECK_NAME).await.map_err(|e| crate::error::SentrixError::internal(e.to_string()))? {
            Some((0, "keep-alive recovered".to_string()))
        } else {
            None
        };

        let Some((status, output)) = synthesized else { continue };

        let payload = json!({
            "client": name,
            "check": {
                "name": CHECK_NAME,
                "status": status,
                "output": output,
                "issued": now,
            }
        });
        let bytes = serde_json::to_vec(&payload).map_err(|e| crate::error::SentrixError::internal(e.to_string()))?;
        broker.publish("results", &bytes).await.map_err(|e| crate::error::SentrixError::internal(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::store::InMemoryStateStore;

    #[tokio::test]
    async fn stale_client_synthesizes_critical_result() {
        let broker = InMemoryBroker::new();
        let store = InMemoryStateStore::new();
        let mut rx = broker.consume("results", 1).await.unwrap();

        let client = Client::new("c1", 1_000);
        store.set(&keys::client("c1"), &serde_json::to_string(&client).unwrap()).await.unwrap();
        store.sadd(keys::clients(), "c1").await.unwrap();

        tick_once(&broker, &store, 1_000 + 200).await.unwrap();

        let delivery = rx.recv().await.unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&delivery.payload).unwrap();
        assert_eq!(payload["check"]["status"], 2);
    }

    #[tokio::test]
    async fn fresh_client_produces_no_synthesis() {
        let broker = InMemoryBroker::new();
        let store = InMemoryStateStore::new();
        broker.consume("results", 1).await.unwrap();

        let client = Client::new("c1", 1_000);
        store.set(&keys::client("c1"), &serde_json::to_string(&client).unwrap()).await.unwrap();
        store.sadd(keys::clients(), "c1").await.unwrap();

        tick_once(&broker, &store, 1_010).await.unwrap();
    }
}
