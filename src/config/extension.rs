use async_trait::async_trait;
use serde_json::Value;

use crate::error::SentrixError;

/// An in-process handler callable, registered by the embedder (spec §4.5,
/// §6's "config registry" external interface). A complete repo needs a
/// concrete extension seam, not just the mention in §6 — this trait and
/// [`MutatorExtension`] are that seam.
#[async_trait]
pub trait HandlerExtension: Send + Sync {
    /// Invoked with the mutated event payload and a flat settings snapshot
    /// (`Registry::to_hash`). Output lines are logged the same way a pipe
    /// handler's stdout lines are.
    async fn call(&self, payload: &[u8], settings: &Value) -> Result<Vec<String>, SentrixError>;
}

/// An in-process mutator callable (spec §4.4).
#[async_trait]
pub trait MutatorExtension: Send + Sync {
    async fn call(&self, payload: &[u8], settings: &Value) -> Result<Vec<u8>, SentrixError>;
}
