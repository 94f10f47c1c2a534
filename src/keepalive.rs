//! Keepalive consumer (spec §4.7).

use std::sync::Arc;

use tracing::{info, warn};

use crate::broker::Broker;
use crate::error::SentrixError;
use crate::keys;
use crate::model::Client;
use crate::store::StateStore;

/// Subscribe to the `keepalives` queue and persist each client descriptor.
/// Ordering across clients is not preserved; per-client last-writer-wins
/// (spec §4.7). Runs until the broker closes the channel (reconnect).
pub async fn run(broker: Arc<dyn Broker>, store: Arc<dyn StateStore>) -> Result<(), SentrixError> {
    // Spec §4.7: cancel any existing consumers on this queue before
    // subscribing, so a resume after pause doesn't end up with two
    // consumers racing over the same queue.
    if let Err(e) = broker.cancel_consumers("keepalives").await {
        warn!(error = %e, "failed to cancel existing keepalives consumers before subscribing");
    }

    let mut deliveries = broker
        .consume("keepalives", 1)
        .await
        .map_err(|e| SentrixError::internal(format!("keepalive consume failed: {e}")))?;

    info!("subscribed to keepalives queue");

    while let Some(delivery) = deliveries.recv().await {
        match serde_json::from_slice::<Client>(&delivery.payload) {
            Ok(client) => {
                if let Err(e) = persist(store.as_ref(), &client).await {
                    warn!(client = client.name.as_str(), error = %e, "failed to persist client");
                }
            }
            Err(e) => {
                warn!(error = %e, "malformed keepalive payload, dropping");
            }
        }
        delivery.ack();
    }

    Ok(())
}

async fn persist(store: &dyn StateStore, client: &Client) -> Result<(), SentrixError> {
    let serialized = serde_json::to_string(client).map_err(|e| SentrixError::internal(e.to_string()))?;
    store.set(&keys::client(&client.name), &serialized).await.map_err(|e| SentrixError::internal(e.to_string()))?;
    store.sadd(keys::clients(), &client.name).await.map_err(|e| SentrixError::internal(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::store::InMemoryStateStore;

    #[tokio::test]
    async fn keepalive_persists_client_and_set_membership() {
        let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());

        let broker_clone = broker.clone();
        let store_clone = store.clone();
        let handle = tokio::spawn(async move { run(broker_clone, store_clone).await });

        // Give the consumer a moment to register before publishing.
        tokio::task::yield_now().await;
        let client = Client::new("web-1".to_string(), 1_700_000_000);
        broker.publish("keepalives", &serde_json::to_vec(&client).unwrap()).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.abort();

        assert!(store.get(&keys::client("web-1")).await.unwrap().is_some());
        assert!(store.smembers(keys::clients()).await.unwrap().contains(&"web-1".to_string()));
    }
}
