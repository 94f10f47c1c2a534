//! Aggregator (spec §4.11) and aggregation pruner (spec §4.12).

use tracing::debug;

use crate::error::SentrixError;
use crate::keys;
use crate::model::{AggregationEntry, CheckResult, Severity};
use crate::store::StateStore;

/// `aggregate_result` (spec §4.11). Uses the store's atomic
/// ensure-then-increment op so a concurrent aggregate for the same
/// `(name, issued)` cannot double-count (spec §9 open question).
pub async fn aggregate_result(store: &dyn StateStore, result: &CheckResult) -> Result<(), SentrixError> {
    let name = &result.check.name;
    let issued = result.check.issued;

    let entry = AggregationEntry { output: result.check.output.clone(), status: result.check.status };
    let entry_json = serde_json::to_string(&entry).map_err(|e| SentrixError::internal(e.to_string()))?;
    store
        .hset(&keys::aggregation(name, issued), &result.client, &entry_json)
        .await
        .map_err(|e| SentrixError::internal(e.to_string()))?;

    let severity = Severity::from(result.check.status);
    let counters_key = keys::aggregate(name, issued);
    store
        .hensure_and_incr(&counters_key, severity.as_str(), 1)
        .await
        .map_err(|e| SentrixError::internal(e.to_string()))?;
    store
        .hensure_and_incr(&counters_key, "total", 1)
        .await
        .map_err(|e| SentrixError::internal(e.to_string()))?;

    store
        .sadd(&keys::aggregates_for(name), &issued.to_string())
        .await
        .map_err(|e| SentrixError::internal(e.to_string()))?;
    store.sadd(keys::aggregates(), name).await.map_err(|e| SentrixError::internal(e.to_string()))?;

    Ok(())
}

/// `aggregate_result`'s pruner (spec §4.12): bound each check's aggregate
/// history to the 20 newest `issued` timestamps.
pub async fn prune_once(store: &dyn StateStore) -> Result<(), SentrixError> {
    let names = store.smembers(keys::aggregates()).await.map_err(|e| SentrixError::internal(e.to_string()))?;

    for name in names {
        let set_key = keys::aggregates_for(&name);
        let mut issued: Vec<i64> = store
            .smembers(&set_key)
            .await
            .map_err(|e| SentrixError::internal(e.to_string()))?
            .into_iter()
            .filter_map(|s| s.parse::<i64>().ok())
            .collect();

        if issued.len() <= 20 {
            continue;
        }

        issued.sort_unstable();
        let extra = issued.len() - 20;
        for stamp in &issued[..extra] {
            debug!(check = name.as_str(), issued = stamp, "pruning aggregate entry");
            store.srem(&set_key, &stamp.to_string()).await.map_err(|e| SentrixError::internal(e.to_string()))?;
            store.del(&keys::aggregate(&name, *stamp)).await.map_err(|e| SentrixError::internal(e.to_string()))?;
            store.del(&keys::aggregation(&name, *stamp)).await.map_err(|e| SentrixError::internal(e.to_string()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResultCheck;
    use crate::store::InMemoryStateStore;
    use serde_json::Map;

    fn result(name: &str, client: &str, status: i64, issued: i64) -> CheckResult {
        CheckResult {
            client: client.to_string(),
            check: ResultCheck {
                name: name.to_string(),
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

    #[tokio::test]
    async fn concurrent_aggregation_does_not_double_count() {
        let store = InMemoryStateStore::new();
        aggregate_result(&store, &result("cpu", "a", 0, 100)).await.unwrap();
        aggregate_result(&store, &result("cpu", "b", 0, 100)).await.unwrap();
        aggregate_result(&store, &result("cpu", "c", 2, 100)).await.unwrap();

        let counters = store.hgetall(&keys::aggregate("cpu", 100)).await.unwrap();
        let map: std::collections::HashMap<_, _> = counters.into_iter().collect();
        assert_eq!(map.get("ok").unwrap(), "2");
        assert_eq!(map.get("critical").unwrap(), "1");
        assert_eq!(map.get("total").unwrap(), "3");
    }

    #[tokio::test]
    async fn pruner_keeps_twenty_newest() {
        let store = InMemoryStateStore::new();
        for issued in 0..25i64 {
            aggregate_result(&store, &result("cpu", "a", 0, issued)).await.unwrap();
        }
        prune_once(&store).await.unwrap();
        let remaining = store.smembers(&keys::aggregates_for("cpu")).await.unwrap();
        assert_eq!(remaining.len(), 20);
        assert!(!remaining.contains(&"0".to_string()));
        assert!(remaining.contains(&"24".to_string()));
    }
}
