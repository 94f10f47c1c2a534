//! Result processor (spec §4.6).

use tracing::debug;

use crate::config::Registry;
use crate::error::SentrixError;
use crate::keys;
use crate::model::{Action, CheckResult, DispatchEvent, EffectiveCheck, EventOccurrence, History, MAX_HISTORY};
use crate::store::StateStore;

use super::aggregate::aggregate_result;

fn to_internal<E: std::fmt::Display>(e: E) -> SentrixError {
    SentrixError::internal(e.to_string())
}

/// `process_result` (spec §4.6). Returns the event to dispatch, if any —
/// dispatch itself is the caller's job (`handler::handle_event`), keeping
/// history/event bookkeeping independent of the handler fan-out.
pub async fn process_result(
    store: &dyn StateStore,
    registry: &Registry,
    result: CheckResult,
) -> Result<Option<DispatchEvent>, SentrixError> {
    // Step 1: orphan result.
    if store.get(&keys::client(&result.client)).await.map_err(to_internal)?.is_none() {
        debug!(client = result.client.as_str(), "dropping result for unknown client");
        return Ok(None);
    }

    // Step 2: merge config over result.
    let config = registry.check(&result.check.name);
    let check = EffectiveCheck::merge(config, &result);

    // Step 3: aggregate, if configured. Normal history/event processing
    // still runs afterward — aggregation is a parallel rollup, not a
    // replacement for the event pipeline.
    if check.aggregate {
        aggregate_result(store, &result).await?;
    }

    // Step 4: append to history.
    let history_key = keys::history(&result.client, &check.name);
    store.rpush(&history_key, &check.status.to_string()).await.map_err(to_internal)?;
    store.ltrim(&history_key, -(MAX_HISTORY as i64), -1).await.map_err(to_internal)?;
    store.sadd(&keys::history_set(&result.client), &check.name).await.map_err(to_internal)?;

    // Step 5: total state change T.
    let statuses: Vec<i64> = store
        .lrange(&history_key, 0, -1)
        .await
        .map_err(to_internal)?
        .into_iter()
        .filter_map(|s| s.parse::<i64>().ok())
        .collect();
    let history = History::from_statuses(statuses);
    let total_state_change = history.total_state_change();

    // Step 6: previous occurrence + flap hysteresis.
    let events_key = keys::events(&result.client);
    let previous: Option<EventOccurrence> = store
        .hget(&events_key, &check.name)
        .await
        .map_err(to_internal)?
        .and_then(|raw| serde_json::from_str(&raw).ok());

    let is_flapping = compute_flapping(&check, previous.as_ref(), total_state_change);

    // Step 7: decide action.
    if check.status != 0 || is_flapping {
        let occurrences = match &previous {
            Some(prev) if prev.status == check.status => prev.occurrences + 1,
            _ => 1,
        };
        let occurrence = EventOccurrence {
            output: check.output.clone(),
            status: check.status,
            issued: check.issued,
            handlers: check.handlers.clone(),
            flapping: is_flapping,
            occurrences,
        };
        let serialized = serde_json::to_string(&occurrence).map_err(to_internal)?;
        store.hset(&events_key, &check.name, &serialized).await.map_err(to_internal)?;

        if !check.handle {
            return Ok(None);
        }
        let action = if is_flapping { Action::Flapping } else { Action::Create };
        return Ok(Some(DispatchEvent { client: result.client, check, action, occurrences, flapping: is_flapping }));
    }

    if let Some(prev) = previous {
        if !check.auto_resolve && !check.force_resolve {
            return Ok(None);
        }
        store.hdel(&events_key, &check.name).await.map_err(to_internal)?;
        if !check.handle {
            return Ok(None);
        }
        return Ok(Some(DispatchEvent {
            client: result.client,
            check,
            action: Action::Resolve,
            occurrences: prev.occurrences,
            flapping: false,
        }));
    }

    if check.check_type.as_deref() == Some("metric") {
        return Ok(Some(DispatchEvent { client: result.client, check, action: Action::None, occurrences: 1, flapping: false }));
    }

    Ok(None)
}

/// Flap hysteresis (spec §4.6 step 6). `total_state_change` is already 0
/// unless the history has exactly [`MAX_HISTORY`] entries (see
/// `History::total_state_change`), so this need not re-check the length.
fn compute_flapping(check: &EffectiveCheck, previous: Option<&EventOccurrence>, total_state_change: u32) -> bool {
    let (Some(low), Some(high)) = (check.low_flap_threshold, check.high_flap_threshold) else {
        return false;
    };
    let was_flapping = previous.map(|p| p.flapping).unwrap_or(false);

    if total_state_change >= high {
        true
    } else if was_flapping && total_state_change <= low {
        false
    } else {
        was_flapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CheckConfig, ResultCheck};
    use crate::store::InMemoryStateStore;
    use serde_json::Map;

    fn result(client: &str, check: &str, status: i64, issued: i64) -> CheckResult {
        CheckResult {
            client: client.to_string(),
            check: ResultCheck {
                name: check.to_string(),
                status,
                output: "out".to_string(),
                issued,
                handler: None,
                handlers: None,
                check_type: None,
                extra: Map::new(),
            },
        }
    }

    async fn seed_client(store: &InMemoryStateStore, name: &str) {
        store.set(&keys::client(name), "{}").await.unwrap();
    }

    #[tokio::test]
    async fn orphan_result_is_dropped_silently() {
        let store = InMemoryStateStore::new();
        let registry = Registry::new(Default::default());
        let outcome = process_result(&store, &registry, result("ghost", "cpu", 0, 1)).await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn steady_ok_produces_no_dispatch() {
        let store = InMemoryStateStore::new();
        let registry = Registry::new(Default::default());
        seed_client(&store, "c1").await;

        for i in 0..25 {
            let outcome = process_result(&store, &registry, result("c1", "cpu", 0, i)).await.unwrap();
            assert!(outcome.is_none());
        }
        let statuses = store.lrange(&keys::history("c1", "cpu"), 0, -1).await.unwrap();
        assert_eq!(statuses.len(), MAX_HISTORY);
    }

    #[tokio::test]
    async fn transition_to_critical_dispatches_create() {
        let store = InMemoryStateStore::new();
        let registry = Registry::new(Default::default());
        seed_client(&store, "c1").await;

        for i in 0..25 {
            process_result(&store, &registry, result("c1", "cpu", 0, i)).await.unwrap();
        }
        let outcome = process_result(&store, &registry, result("c1", "cpu", 2, 100)).await.unwrap().unwrap();
        assert_eq!(outcome.action, Action::Create);
        assert_eq!(outcome.occurrences, 1);
        assert!(!outcome.flapping);
    }

    #[tokio::test]
    async fn continued_critical_increments_occurrences() {
        let store = InMemoryStateStore::new();
        let registry = Registry::new(Default::default());
        seed_client(&store, "c1").await;
        for i in 0..25 {
            process_result(&store, &registry, result("c1", "cpu", 0, i)).await.unwrap();
        }
        process_result(&store, &registry, result("c1", "cpu", 2, 100)).await.unwrap();
        process_result(&store, &registry, result("c1", "cpu", 2, 101)).await.unwrap();
        let outcome = process_result(&store, &registry, result("c1", "cpu", 2, 102)).await.unwrap().unwrap();
        assert_eq!(outcome.occurrences, 3);
        assert_eq!(outcome.action, Action::Create);
    }

    #[tokio::test]
    async fn resolve_clears_event_and_reports_prior_occurrences() {
        let store = InMemoryStateStore::new();
        let registry = Registry::new(Default::default());
        seed_client(&store, "c1").await;
        for i in 0..25 {
            process_result(&store, &registry, result("c1", "cpu", 0, i)).await.unwrap();
        }
        process_result(&store, &registry, result("c1", "cpu", 2, 100)).await.unwrap();
        process_result(&store, &registry, result("c1", "cpu", 2, 101)).await.unwrap();
        process_result(&store, &registry, result("c1", "cpu", 2, 102)).await.unwrap();

        let outcome = process_result(&store, &registry, result("c1", "cpu", 0, 103)).await.unwrap().unwrap();
        assert_eq!(outcome.action, Action::Resolve);
        assert_eq!(outcome.occurrences, 3);
        assert!(store.hget(&keys::events("c1"), "cpu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn alternating_history_flaps_then_settles() {
        let mut cfg = CheckConfig { name: "cpu".to_string(), ..Default::default() };
        cfg.low_flap_threshold = Some(5);
        cfg.high_flap_threshold = Some(50);
        let mut config = crate::config::Config::default();
        config.checks.push(cfg);
        let registry = Registry::new(config);
        let store = InMemoryStateStore::new();
        seed_client(&store, "c1").await;

        let mut last = None;
        for i in 0..21 {
            let status = if i % 2 == 0 { 0 } else { 2 };
            last = process_result(&store, &registry, result("c1", "cpu", status, i)).await.unwrap();
        }
        let event = last.unwrap();
        assert_eq!(event.action, Action::Flapping);
        assert!(event.flapping);

        let mut settled = None;
        for i in 21..42 {
            settled = process_result(&store, &registry, result("c1", "cpu", 0, i)).await.unwrap();
        }
        assert!(settled.is_none());
    }

    #[tokio::test]
    async fn metric_check_with_no_prior_occurrence_dispatches_action_none() {
        let mut cfg = CheckConfig { name: "latency".to_string(), ..Default::default() };
        cfg.check_type = Some("metric".to_string());
        let mut config = crate::config::Config::default();
        config.checks.push(cfg);
        let registry = Registry::new(config);
        let store = InMemoryStateStore::new();
        seed_client(&store, "c1").await;

        let outcome = process_result(&store, &registry, result("c1", "latency", 0, 1)).await.unwrap().unwrap();
        assert_eq!(outcome.action, Action::None);
        assert_eq!(outcome.occurrences, 1);
    }
}
