//! Master election (spec §4.9), with a fencing token per §9's design note:
//! the lock value carries `(timestamp, term)` rather than a bare
//! timestamp, so a resurrected ex-master whose renewal wakes up late can
//! tell it no longer holds the current term and refuses to act as master.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SentrixError;
use crate::keys;
use crate::store::StateStore;

/// Advisory TTL on the master lock (spec §5).
pub const LOCK_TTL_SECS: i64 = 60;
/// Lock renewal period (spec §5).
pub const RENEWAL_PERIOD_SECS: u64 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct LockValue {
    timestamp: i64,
    term: u64,
}

/// Tracks this process's mastership and drives the election/renewal
/// protocol of spec §4.9.
pub struct MasterElection {
    store: Arc<dyn StateStore>,
    term: AtomicU64,
    is_master: AtomicBool,
}

impl MasterElection {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store, term: AtomicU64::new(0), is_master: AtomicBool::new(false) }
    }

    #[must_use]
    pub fn is_master(&self) -> bool {
        self.is_master.load(Ordering::SeqCst)
    }

    /// Force this process to stop believing it is master, without
    /// touching the store. Used by the lifecycle's resignation ceiling
    /// (spec §4.9: "forced and logged").
    pub fn force_demote(&self) {
        self.is_master.store(false, Ordering::SeqCst);
    }

    fn become_master(&self, term: u64) {
        self.term.store(term, Ordering::SeqCst);
        self.is_master.store(true, Ordering::SeqCst);
    }

    /// `setnx` attempt, then (on failure) the TTL-expired `getset` swap
    /// (spec §4.9 "Election" paragraph).
    pub async fn try_elect(&self, now: i64) -> Result<bool, SentrixError> {
        let next_term = self.term.load(Ordering::SeqCst) + 1;
        let candidate = LockValue { timestamp: now, term: next_term };
        let candidate_json = serde_json::to_string(&candidate).map_err(|e| SentrixError::internal(e.to_string()))?;

        if self.store.setnx(keys::lock_master(), &candidate_json).await.map_err(|e| SentrixError::internal(e.to_string()))? {
            self.become_master(next_term);
            return Ok(true);
        }

        let Some(raw) = self.store.get(keys::lock_master()).await.map_err(|e| SentrixError::internal(e.to_string()))? else {
            return Ok(false);
        };
        let Ok(current) = serde_json::from_str::<LockValue>(&raw) else {
            return Ok(false);
        };

        if now - current.timestamp >= LOCK_TTL_SECS {
            let previous = self
                .store
                .getset(keys::lock_master(), &candidate_json)
                .await
                .map_err(|e| SentrixError::internal(e.to_string()))?;
            if previous.as_deref() == Some(raw.as_str()) {
                self.become_master(next_term);
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Lock renewal (spec §4.9): if master, rewrite the lock with the
    /// current term's timestamp refreshed — but first confirm the stored
    /// lock still carries our term, closing the fencing gap (spec §9).
    /// If not master, attempt election.
    pub async fn renew_or_elect(&self, now: i64) -> Result<(), SentrixError> {
        if !self.is_master() {
            self.try_elect(now).await?;
            return Ok(());
        }

        let our_term = self.term.load(Ordering::SeqCst);
        let still_ours = match self.store.get(keys::lock_master()).await.map_err(|e| SentrixError::internal(e.to_string()))? {
            Some(raw) => serde_json::from_str::<LockValue>(&raw).map(|v| v.term == our_term).unwrap_or(false),
            None => false,
        };

        if !still_ours {
            warn!(term = our_term, "lost master lock to another process, demoting");
            self.force_demote();
            return Ok(());
        }

        let renewed = LockValue { timestamp: now, term: our_term };
        let serialized = serde_json::to_string(&renewed).map_err(|e| SentrixError::internal(e.to_string()))?;
        self.store.set(keys::lock_master(), &serialized).await.map_err(|e| SentrixError::internal(e.to_string()))?;
        Ok(())
    }

    /// Resignation (spec §4.9): delete the lock if the store is connected,
    /// then stop believing we're master.
    pub async fn resign(&self, store_connected: bool) -> Result<(), SentrixError> {
        if store_connected {
            self.store.del(keys::lock_master()).await.map_err(|e| SentrixError::internal(e.to_string()))?;
        }
        self.is_master.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStateStore;

    #[tokio::test]
    async fn first_election_wins_uncontested() {
        let election = MasterElection::new(Arc::new(InMemoryStateStore::new()));
        assert!(election.try_elect(1000).await.unwrap());
        assert!(election.is_master());
    }

    #[tokio::test]
    async fn second_process_does_not_win_before_ttl_expires() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let a = MasterElection::new(store.clone());
        let b = MasterElection::new(store.clone());

        assert!(a.try_elect(1000).await.unwrap());
        assert!(!b.try_elect(1010).await.unwrap());
        assert!(!b.is_master());
    }

    #[tokio::test]
    async fn election_succeeds_after_ttl_expiry() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let a = MasterElection::new(store.clone());
        let b = MasterElection::new(store.clone());

        assert!(a.try_elect(1000).await.unwrap());
        assert!(b.try_elect(1000 + LOCK_TTL_SECS).await.unwrap());
        assert!(b.is_master());
    }

    #[tokio::test]
    async fn renewal_demotes_when_lock_stolen() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let a = MasterElection::new(store.clone());
        let b = MasterElection::new(store.clone());

        assert!(a.try_elect(1000).await.unwrap());
        assert!(b.try_elect(1000 + LOCK_TTL_SECS).await.unwrap());

        // `a` wakes up late and tries to renew; it no longer owns the lock.
        a.renew_or_elect(1000 + LOCK_TTL_SECS + 1).await.unwrap();
        assert!(!a.is_master());
    }
}
