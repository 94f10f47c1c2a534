//! Key-value store abstraction (spec §6).
//!
//! `StateStore` exposes exactly the operations spec §6 lists as required,
//! plus `hgetall` (a standard redis-family op this crate needs to read back
//! aggregate counters and event occurrences in whole). Two backends are
//! provided: [`memory::InMemoryStateStore`] for tests and single-process
//! embedding, and [`redis_backend::RedisStateStore`] for production.

mod memory;
mod redis_backend;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use memory::InMemoryStateStore;
pub use redis_backend::RedisStateStore;

use crate::connection::ConnectionEvent;

/// Errors from the key-value store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// The key-value store contract (spec §6).
///
/// All methods are async: reactor callbacks never block, per spec §5, so
/// every store round-trip is awaited rather than performed synchronously.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Set only if absent. Returns `true` if the key was set.
    async fn setnx(&self, key: &str, value: &str) -> Result<bool, StoreError>;
    /// Atomically set and return the previous value.
    async fn getset(&self, key: &str, value: &str) -> Result<Option<String>, StoreError>;
    /// Delete a key. Returns `true` if it existed.
    async fn del(&self, key: &str) -> Result<bool, StoreError>;

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;
    async fn hdel(&self, key: &str, field: &str) -> Result<bool, StoreError>;
    /// Set a hash field only if absent. Returns `true` if set.
    async fn hsetnx(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError>;
    async fn hexists(&self, key: &str, field: &str) -> Result<bool, StoreError>;
    /// Increment a hash field (creating it at 0 first if absent) and return
    /// the new value.
    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError>;
    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, StoreError>;

    async fn rpush(&self, key: &str, value: &str) -> Result<u64, StoreError>;
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError>;
    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError>;

    /// Whether the backend currently reports itself connected.
    async fn connected(&self) -> bool;

    /// Connection lifecycle events (spec §4.9's backend disconnect
    /// policy: store connection-error triggers a fatal stop, store
    /// reconnect-start triggers a pause, store reconnect-success triggers
    /// a resume). Called once by the reactor at startup; backends that
    /// never disconnect (the in-memory test double) may return a channel
    /// whose sender is already dropped.
    fn connection_events(&self) -> mpsc::Receiver<ConnectionEvent>;

    /// Ensure a hash field exists at `0` and atomically increment it,
    /// closing the §9 double-count race between `hsetnx` and `hincrby`.
    /// Default implementation does the two calls non-atomically; backends
    /// that can linearize them should override.
    async fn hensure_and_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        self.hsetnx(key, field, "0").await?;
        self.hincrby(key, field, delta).await
    }
}

#[cfg(test)]
mod trait_object_safety {
    use super::StateStore;

    fn _assert_object_safe(_: &dyn StateStore) {}
}
