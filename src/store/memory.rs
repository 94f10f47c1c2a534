use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::connection::ConnectionEvent;

use super::{StateStore, StoreError};

#[derive(Default)]
struct Shard {
    strings: BTreeMap<String, String>,
    sets: BTreeMap<String, BTreeSet<String>>,
    hashes: BTreeMap<String, BTreeMap<String, String>>,
    lists: BTreeMap<String, Vec<String>>,
}

/// In-memory `StateStore` used by tests and by single-process deployments
/// that don't need a shared backend (grounded on the teacher's in-memory
/// trait implementations under `storage/`).
#[derive(Default)]
pub struct InMemoryStateStore {
    shard: Mutex<Shard>,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn clamp_range(len: usize, start: i64, stop: i64) -> (usize, usize) {
    let len = len as i64;
    let norm = |i: i64| -> i64 {
        if i < 0 {
            (len + i).max(0)
        } else {
            i.min(len)
        }
    };
    let start = norm(start);
    let stop = norm(stop) + 1;
    if start >= stop || len == 0 {
        (0, 0)
    } else {
        (start as usize, stop.min(len) as usize)
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.shard.lock().unwrap().strings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.shard.lock().unwrap().strings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn setnx(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut shard = self.shard.lock().unwrap();
        if shard.strings.contains_key(key) {
            Ok(false)
        } else {
            shard.strings.insert(key.to_string(), value.to_string());
            Ok(true)
        }
    }

    async fn getset(&self, key: &str, value: &str) -> Result<Option<String>, StoreError> {
        Ok(self.shard.lock().unwrap().strings.insert(key.to_string(), value.to_string()))
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let mut shard = self.shard.lock().unwrap();
        let mut existed = shard.strings.remove(key).is_some();
        existed |= shard.sets.remove(key).is_some();
        existed |= shard.hashes.remove(key).is_some();
        existed |= shard.lists.remove(key).is_some();
        Ok(existed)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self.shard.lock().unwrap().sets.entry(key.to_string()).or_default().insert(member.to_string()))
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self
            .shard
            .lock()
            .unwrap()
            .sets
            .get_mut(key)
            .is_some_and(|set| set.remove(member)))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .shard
            .lock()
            .unwrap()
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.shard
            .lock()
            .unwrap()
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        Ok(self.shard.lock().unwrap().hashes.get(key).and_then(|h| h.get(field).cloned()))
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        Ok(self
            .shard
            .lock()
            .unwrap()
            .hashes
            .get_mut(key)
            .is_some_and(|h| h.remove(field).is_some()))
    }

    async fn hsetnx(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        let mut shard = self.shard.lock().unwrap();
        let h = shard.hashes.entry(key.to_string()).or_default();
        if h.contains_key(field) {
            Ok(false)
        } else {
            h.insert(field.to_string(), value.to_string());
            Ok(true)
        }
    }

    async fn hexists(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        Ok(self
            .shard
            .lock()
            .unwrap()
            .hashes
            .get(key)
            .is_some_and(|h| h.contains_key(field)))
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        let mut shard = self.shard.lock().unwrap();
        let h = shard.hashes.entry(key.to_string()).or_default();
        let current = h.get(field).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
        let updated = current + delta;
        h.insert(field.to_string(), updated.to_string());
        Ok(updated)
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .shard
            .lock()
            .unwrap()
            .hashes
            .get(key)
            .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let mut shard = self.shard.lock().unwrap();
        let list = shard.lists.entry(key.to_string()).or_default();
        list.push(value.to_string());
        Ok(list.len() as u64)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        let shard = self.shard.lock().unwrap();
        let Some(list) = shard.lists.get(key) else {
            return Ok(Vec::new());
        };
        let (lo, hi) = clamp_range(list.len(), start, stop);
        Ok(list[lo..hi].to_vec())
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError> {
        let mut shard = self.shard.lock().unwrap();
        if let Some(list) = shard.lists.get_mut(key) {
            let (lo, hi) = clamp_range(list.len(), start, stop);
            *list = list[lo..hi].to_vec();
        }
        Ok(())
    }

    async fn connected(&self) -> bool {
        true
    }

    fn connection_events(&self) -> mpsc::Receiver<ConnectionEvent> {
        mpsc::channel(1).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn setnx_only_sets_once() {
        let store = InMemoryStateStore::new();
        assert!(store.setnx("k", "a").await.unwrap());
        assert!(!store.setnx("k", "b").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("a".to_string()));
    }

    #[tokio::test]
    async fn hincrby_creates_and_increments() {
        let store = InMemoryStateStore::new();
        assert_eq!(store.hincrby("h", "n", 5).await.unwrap(), 5);
        assert_eq!(store.hincrby("h", "n", 3).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn rpush_and_ltrim_bound_the_list() {
        let store = InMemoryStateStore::new();
        for i in 0..25 {
            store.rpush("l", &i.to_string()).await.unwrap();
        }
        store.ltrim("l", -21, -1).await.unwrap();
        let values = store.lrange("l", 0, -1).await.unwrap();
        assert_eq!(values.len(), 21);
        assert_eq!(values[0], "4");
        assert_eq!(values[20], "24");
    }

    #[tokio::test]
    async fn sadd_srem_roundtrip() {
        let store = InMemoryStateStore::new();
        assert!(store.sadd("s", "a").await.unwrap());
        assert!(!store.sadd("s", "a").await.unwrap());
        assert!(store.srem("s", "a").await.unwrap());
        assert!(store.smembers("s").await.unwrap().is_empty());
    }
}
