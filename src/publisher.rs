//! Publisher scheduler (spec §4.8): staggered periodic emission of check
//! requests to agent subscription exchanges. Each subscriber entry is a
//! fanout exchange name, not a queue: every agent bound to it receives the
//! check request, not just one competing consumer.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::warn;

use crate::broker::Broker;
use crate::config::Registry;
use crate::handler::check_subdued;
use crate::model::SubdueGate;

/// Spawns one timer task per publishable check and returns their join
/// handles, so the caller (master lifecycle, spec §4.9) can track and
/// cancel exactly the master-owned timer set.
pub fn spawn_all(
    registry: Arc<Registry>,
    broker: Arc<dyn Broker>,
    now_unix: impl Fn() -> i64 + Send + Sync + Clone + 'static,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    for (index, check) in registry.checks().iter().enumerate() {
        let publish = check.publish.unwrap_or(true);
        let standalone = check.standalone.unwrap_or(false);
        if !publish || standalone {
            continue;
        }

        let Some(interval_secs) = check.interval else {
            warn!(check = check.name.as_str(), "publishable check has no interval, skipping");
            continue;
        };

        let stagger = if registry.testing() {
            Duration::ZERO
        } else {
            Duration::from_secs((2 * (index as u64 + 1)) % 30)
        };
        let period = if registry.testing() { Duration::from_millis(500) } else { Duration::from_secs(interval_secs) };

        let broker = broker.clone();
        let check = check.clone();
        let now_unix = now_unix.clone();

        handles.push(tokio::spawn(async move {
            tokio::time::sleep(stagger).await;
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if check_subdued(check.subdue.as_ref(), SubdueGate::Publisher) {
                    continue;
                }
                if let Err(e) = publish_once(broker.as_ref(), &check, now_unix()).await {
                    warn!(check = check.name.as_str(), error = %e, "failed to publish check request");
                }
            }
        }));
    }

    handles
}

async fn publish_once(
    broker: &dyn Broker,
    check: &crate::model::CheckConfig,
    now: i64,
) -> Result<(), crate::error::SentrixError> {
    let payload = json!({
        "name": check.name,
        "command": check.command,
        "issued": now,
    });
    let bytes = serde_json::to_vec(&payload).map_err(|e| crate::error::SentrixError::internal(e.to_string()))?;

    let mut seen = HashSet::new();
    for subscriber in &check.subscribers {
        if !seen.insert(subscriber.clone()) {
            continue;
        }
        broker.publish_fanout(subscriber, &bytes).await.map_err(|e| crate::error::SentrixError::internal(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::config::Config;
    use crate::model::CheckConfig;

    #[tokio::test]
    async fn publishes_to_each_unique_subscriber() {
        let broker = InMemoryBroker::new();
        let mut rx = broker.consume("prod", 1).await.unwrap();

        let check = CheckConfig { name: "cpu".to_string(), subscribers: vec!["prod".to_string(), "prod".to_string()], ..Default::default() };
        publish_once(&broker, &check, 1000).await.unwrap();

        let delivery = rx.recv().await.unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&delivery.payload).unwrap();
        assert_eq!(payload["name"], "cpu");
        assert!(rx.try_recv().is_err(), "duplicate subscriber must not publish twice");
    }

    #[test]
    fn non_publishable_checks_are_skipped() {
        let mut config = Config::default();
        config.checks.push(CheckConfig { name: "standalone-check".to_string(), standalone: Some(true), ..Default::default() });
        config.checks.push(CheckConfig { name: "no-publish".to_string(), publish: Some(false), ..Default::default() });
        let registry = Arc::new(Registry::new(config));
        let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
        let handles = spawn_all(registry, broker, || 0);
        assert!(handles.is_empty());
    }
}
