//! End-to-end: a stale client is caught by the watchdog, the synthesized
//! result flows through the same `results` queue and processor as a real
//! agent result, and ultimately reaches a handler (spec §4.10: "so
//! synthetic results flow through the same processor").

use std::collections::HashMap;
use std::sync::Arc;

use sentrix::broker::{Broker, InMemoryBroker};
use sentrix::config::{Config, HandlerCommon, HandlerConfig, Registry};
use sentrix::handler::{handle_event, WaitGroup};
use sentrix::model::{CheckConfig, CheckResult};
use sentrix::processing::process_result;
use sentrix::store::{InMemoryStateStore, StateStore};

#[tokio::test]
async fn stale_client_result_is_processed_and_dispatched() {
    let capture = tempfile::NamedTempFile::new().unwrap();
    let capture_path = capture.path().to_str().unwrap().to_string();

    let mut handlers = HashMap::new();
    handlers.insert(
        "default".to_string(),
        HandlerConfig::Pipe { command: format!("cat > {capture_path}"), common: HandlerCommon::default() },
    );
    let mut config = Config::default();
    config.checks.push(CheckConfig { name: "keepalive".to_string(), ..Default::default() });
    config.handlers = handlers;

    let registry = Arc::new(Registry::new(config));
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());

    store.set(&sentrix::keys::client("edge-1"), r#"{"name":"edge-1","timestamp":1000}"#).await.unwrap();
    store.sadd(sentrix::keys::clients(), "edge-1").await.unwrap();

    let mut results_rx = broker.consume("results", 1).await.unwrap();
    sentrix::watchdog::tick_once(broker.as_ref(), store.as_ref(), 1000 + 200).await.unwrap();

    let delivery = results_rx.recv().await.unwrap();
    let result: CheckResult = serde_json::from_slice(&delivery.payload).unwrap();
    delivery.ack();
    assert_eq!(result.check.status, 2);

    let wait_group = WaitGroup::new();
    if let Some(event) = process_result(store.as_ref(), &registry, result).await.unwrap() {
        handle_event(registry.clone(), broker.clone(), wait_group.clone(), event).await;
    }
    wait_group.wait_idle().await;

    let written = tokio::fs::read_to_string(&capture_path).await.unwrap();
    let payload: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(payload["client"], "edge-1");
    assert_eq!(payload["check"]["name"], "keepalive");
}
