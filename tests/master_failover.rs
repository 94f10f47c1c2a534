//! End-to-end master failover (spec §4.9/§8): a clean resignation hands
//! off immediately, while an unannounced crash (no resignation) only
//! hands off once the lock's TTL has elapsed, and the old master's
//! next tick observes the takeover and self-demotes.

use std::sync::Arc;

use sentrix::master::{Lifecycle, MasterElection, LOCK_TTL_SECS};
use sentrix::store::{InMemoryStateStore, StateStore};

#[tokio::test]
async fn clean_resignation_hands_off_without_waiting_for_ttl() {
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
    let a = Arc::new(MasterElection::new(store.clone()));
    let b = Arc::new(MasterElection::new(store.clone()));

    assert!(a.try_elect(1_000).await.unwrap());
    assert!(a.is_master());

    let lifecycle_a = Lifecycle::new(a.clone(), sentrix::handler::WaitGroup::new());
    lifecycle_a.resign(true).await;
    assert!(!a.is_master());

    // b can win immediately afterward, well before the TTL would expire.
    assert!(b.try_elect(1_001).await.unwrap());
    assert!(b.is_master());
}

#[tokio::test]
async fn crashed_master_only_replaced_after_ttl_then_self_demotes_on_wakeup() {
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
    let a = Arc::new(MasterElection::new(store.clone()));
    let b = Arc::new(MasterElection::new(store.clone()));

    assert!(a.try_elect(1_000).await.unwrap());
    assert!(a.is_master());

    // b polls every RENEWAL_PERIOD_SECS but cannot take over before the TTL.
    assert!(!b.try_elect(1_000 + LOCK_TTL_SECS - 1).await.unwrap());
    assert!(!b.is_master());

    // Once the TTL has elapsed, b wins the lock.
    assert!(b.try_elect(1_000 + LOCK_TTL_SECS).await.unwrap());
    assert!(b.is_master());

    // a wakes up late, unaware it was ever replaced, and its renewal tick
    // discovers the term mismatch and demotes itself rather than racing.
    a.renew_or_elect(1_000 + LOCK_TTL_SECS + 5).await.unwrap();
    assert!(!a.is_master());
    assert!(b.is_master());
}
