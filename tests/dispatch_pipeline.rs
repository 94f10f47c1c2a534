//! End-to-end: a result lands on the `results` queue equivalent, the
//! processor derives a create event, and the event reaches a pipe
//! handler's subprocess with the mutated payload on stdin.

use std::collections::HashMap;
use std::sync::Arc;

use sentrix::broker::{Broker, InMemoryBroker};
use sentrix::config::{Config, HandlerCommon, HandlerConfig, Registry};
use sentrix::handler::{handle_event, WaitGroup};
use sentrix::model::{CheckConfig, CheckResult};
use sentrix::processing::process_result;
use sentrix::store::{InMemoryStateStore, StateStore};

fn result(client: &str, check: &str, status: i64, issued: i64) -> CheckResult {
    serde_json::from_value(serde_json::json!({
        "client": client,
        "check": { "name": check, "status": status, "output": "load too high", "issued": issued }
    }))
    .unwrap()
}

#[tokio::test]
async fn critical_result_flows_through_to_pipe_handler_stdin() {
    let capture = tempfile::NamedTempFile::new().unwrap();
    let capture_path = capture.path().to_str().unwrap().to_string();

    let mut handlers = HashMap::new();
    handlers.insert(
        "default".to_string(),
        HandlerConfig::Pipe { command: format!("cat > {capture_path}"), common: HandlerCommon::default() },
    );

    let mut config = Config::default();
    config.checks.push(CheckConfig { name: "cpu".to_string(), ..Default::default() });
    config.handlers = handlers;

    let registry = Arc::new(Registry::new(config));
    let store = InMemoryStateStore::new();
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let wait_group = WaitGroup::new();

    store.set(&sentrix::keys::client("web-1"), "{}").await.unwrap();

    // Twenty-five steady OK results build a full history window before the
    // transition, matching the shape of the inline result-processor tests.
    for i in 0..25 {
        process_result(&store, &registry, result("web-1", "cpu", 0, i)).await.unwrap();
    }

    let event = process_result(&store, &registry, result("web-1", "cpu", 2, 100)).await.unwrap().expect("transition dispatches");

    handle_event(registry.clone(), broker.clone(), wait_group.clone(), event).await;
    wait_group.wait_idle().await;

    let written = tokio::fs::read_to_string(&capture_path).await.unwrap();
    let payload: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(payload["client"], "web-1");
    assert_eq!(payload["check"]["name"], "cpu");
    assert_eq!(payload["action"], "create");
}

#[tokio::test]
async fn severities_gate_drops_event_before_dispatch() {
    let capture = tempfile::NamedTempFile::new().unwrap();
    let capture_path = capture.path().to_str().unwrap().to_string();

    let mut handlers = HashMap::new();
    handlers.insert(
        "default".to_string(),
        HandlerConfig::Pipe {
            command: format!("cat > {capture_path}"),
            common: HandlerCommon { severities: Some(vec!["critical".to_string()]), ..Default::default() },
        },
    );

    let mut config = Config::default();
    config.checks.push(CheckConfig { name: "cpu".to_string(), ..Default::default() });
    config.handlers = handlers;

    let registry = Arc::new(Registry::new(config));
    let store = InMemoryStateStore::new();
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let wait_group = WaitGroup::new();

    store.set(&sentrix::keys::client("web-1"), "{}").await.unwrap();
    for i in 0..25 {
        process_result(&store, &registry, result("web-1", "cpu", 0, i)).await.unwrap();
    }
    // Status 1 is "warning", which the handler's severities filter excludes.
    let event = process_result(&store, &registry, result("web-1", "cpu", 1, 100)).await.unwrap().expect("transition dispatches");

    handle_event(registry.clone(), broker.clone(), wait_group.clone(), event).await;
    wait_group.wait_idle().await;

    assert!(tokio::fs::read_to_string(&capture_path).await.unwrap().is_empty());
}
