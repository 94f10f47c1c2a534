use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::mpsc;

use crate::connection::ConnectionEvent;

use super::{StateStore, StoreError};

const PING_POLL: Duration = Duration::from_secs(2);

/// Redis-backed `StateStore` (spec §6). Grounded on `other_examples/`
/// manifests that reach for the `redis` crate's async connection manager
/// rather than a bare `Client`, which auto-reconnects across the master
/// failovers this crate runs alongside.
pub struct RedisStateStore {
    conn: ConnectionManager,
    events: StdMutex<Option<mpsc::Receiver<ConnectionEvent>>>,
}

impl RedisStateStore {
    /// Connect to `redis_url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let (tx, rx) = mpsc::channel(32);
        spawn_ping_watcher(conn.clone(), tx);

        Ok(Self { conn, events: StdMutex::new(Some(rx)) })
    }
}

/// `ConnectionManager` reconnects silently under the hood; the only way to
/// observe the transition is to keep pinging and watch the result flip.
/// Grounded on this crate's own `watchdog.rs` ticking pattern.
fn spawn_ping_watcher(mut conn: ConnectionManager, tx: mpsc::Sender<ConnectionEvent>) {
    tokio::spawn(async move {
        let mut was_connected = true;
        loop {
            tokio::time::sleep(PING_POLL).await;
            let ping: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
            match (ping.is_ok(), was_connected) {
                (false, true) => {
                    was_connected = false;
                    if tx.send(ConnectionEvent::Error("redis ping failed".to_string())).await.is_err() {
                        return;
                    }
                    if tx.send(ConnectionEvent::ReconnectStart).await.is_err() {
                        return;
                    }
                }
                (true, false) => {
                    was_connected = true;
                    if tx.send(ConnectionEvent::ReconnectSuccess).await.is_err() {
                        return;
                    }
                }
                _ => {}
            }
        }
    });
}

fn backend_err(e: redis::RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(backend_err)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set(key, value).await.map_err(backend_err)
    }

    async fn setnx(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        conn.set_nx(key, value).await.map_err(backend_err)
    }

    async fn getset(&self, key: &str, value: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.getset(key, value).await.map_err(backend_err)
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(key).await.map_err(backend_err)?;
        Ok(deleted > 0)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let added: i64 = conn.sadd(key, member).await.map_err(backend_err)?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.srem(key, member).await.map_err(backend_err)?;
        Ok(removed > 0)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.smembers(key).await.map_err(backend_err)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.hset(key, field, value).await.map_err(backend_err)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.hget(key, field).await.map_err(backend_err)
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.hdel(key, field).await.map_err(backend_err)?;
        Ok(removed > 0)
    }

    async fn hsetnx(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        conn.hset_nx(key, field, value).await.map_err(backend_err)
    }

    async fn hexists(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        conn.hexists(key, field).await.map_err(backend_err)
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        conn.hincr(key, field, delta).await.map_err(backend_err)
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, StoreError> {
        let mut conn = self.conn.clone();
        let map: std::collections::HashMap<String, String> = conn.hgetall(key).await.map_err(backend_err)?;
        Ok(map.into_iter().collect())
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        conn.rpush(key, value).await.map_err(backend_err)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.lrange(key, start as isize, stop as isize).await.map_err(backend_err)
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.ltrim(key, start as isize, stop as isize).await.map_err(backend_err)
    }

    async fn connected(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await.is_ok()
    }

    fn connection_events(&self) -> mpsc::Receiver<ConnectionEvent> {
        self.events.lock().unwrap().take().unwrap_or_else(|| mpsc::channel(1).1)
    }

    async fn hensure_and_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        // HINCRBY creates the field at 0 itself when absent, so a single
        // round-trip already closes the hsetnx/hincrby race (spec §9).
        self.hincrby(key, field, delta).await
    }
}
