//! Lifecycle state machine (spec §4.9): pause/resume/stop under broker
//! disconnect, driving §4.8/§4.10/§4.12's master-only timers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::handler::WaitGroup;

use super::election::MasterElection;

const RESIGNATION_CEILING: Duration = Duration::from_secs(3);
const UNSUBSCRIBE_CEILING: Duration = Duration::from_secs(5);
const RESUME_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    Pausing,
    Paused,
    Stopping,
}

/// Owns the master-only timer set (spec §3 invariant v / §4.9: "tracked in
/// a dedicated list disjoint from non-master timers") plus the reactor's
/// non-master timers, so resignation and pause cancel exactly the right
/// set.
pub struct Lifecycle {
    state: Mutex<LifecycleState>,
    election: Arc<MasterElection>,
    master_timers: Mutex<Vec<JoinHandle<()>>>,
    non_master_timers: Mutex<Vec<JoinHandle<()>>>,
    wait_group: WaitGroup,
}

impl Lifecycle {
    #[must_use]
    pub fn new(election: Arc<MasterElection>, wait_group: WaitGroup) -> Self {
        Self {
            state: Mutex::new(LifecycleState::Running),
            election,
            master_timers: Mutex::new(Vec::new()),
            non_master_timers: Mutex::new(Vec::new()),
            wait_group,
        }
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.lock().await
    }

    async fn set_state(&self, state: LifecycleState) {
        *self.state.lock().await = state;
    }

    /// Register a master-only timer (publisher, watchdog, pruner tasks)
    /// so it is cancelled precisely on resignation.
    pub async fn register_master_timer(&self, handle: JoinHandle<()>) {
        self.master_timers.lock().await.push(handle);
    }

    pub async fn register_non_master_timer(&self, handle: JoinHandle<()>) {
        self.non_master_timers.lock().await.push(handle);
    }

    /// Resignation (spec §4.9): cancel all master timers, delete the lock
    /// if the store is connected, then wait for `is_master == false` with
    /// a 3s ceiling after which it's forced and logged.
    pub async fn resign(&self, store_connected: bool) {
        {
            let mut timers = self.master_timers.lock().await;
            for handle in timers.drain(..) {
                handle.abort();
            }
        }

        if let Err(e) = self.election.resign(store_connected).await {
            warn!(error = %e, "error clearing master lock during resignation");
        }

        let waited = tokio::time::timeout(RESIGNATION_CEILING, async {
            while self.election.is_master() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        if waited.is_err() && self.election.is_master() {
            warn!("resignation ceiling exceeded, forcing demotion");
            self.election.force_demote();
        }
    }

    /// Pause (spec §4.9): cancel non-master timers, unsubscribe both
    /// queues (here modeled as aborting the passed-in consumer task
    /// handles, with a 5s ceiling on the abort+join), then resign as
    /// master. `running -> pausing -> paused`. Idempotent: pausing an
    /// already-paused lifecycle just re-confirms the transition.
    pub async fn pause(&self, store_connected: bool, consumer_handles: Vec<JoinHandle<()>>) {
        self.set_state(LifecycleState::Pausing).await;

        {
            let mut timers = self.non_master_timers.lock().await;
            for handle in timers.drain(..) {
                handle.abort();
            }
        }

        let unsubscribe = tokio::time::timeout(UNSUBSCRIBE_CEILING, async {
            for handle in consumer_handles {
                handle.abort();
            }
        });
        if unsubscribe.await.is_err() {
            warn!("unsubscribe confirmation ceiling exceeded, forcing");
        }

        self.resign(store_connected).await;
        self.set_state(LifecycleState::Paused).await;
        info!("paused");
    }

    /// Resume (spec §4.9): caller polls this at 1s intervals and, once
    /// both backing stores report connected, invokes `bootstrap` (expected
    /// to re-subscribe and re-enter election) before this returns.
    pub async fn resume<F, Fut>(&self, stores_connected: impl Fn() -> bool, bootstrap: F)
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        loop {
            if self.state().await != LifecycleState::Paused {
                return;
            }
            if stores_connected() {
                bootstrap().await;
                self.set_state(LifecycleState::Running).await;
                info!("resumed");
                return;
            }
            tokio::time::sleep(RESUME_POLL).await;
        }
    }

    /// Stop (spec §4.9): mark stopping, pause, then wait for the in-flight
    /// handler wait-group to drain before the caller closes store handles
    /// and stops the reactor.
    pub async fn stop(&self, store_connected: bool, consumer_handles: Vec<JoinHandle<()>>) {
        self.set_state(LifecycleState::Stopping).await;
        self.pause(store_connected, consumer_handles).await;
        self.wait_group.wait_idle().await;
        info!("stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStateStore;

    #[tokio::test]
    async fn pause_then_resume_round_trips_state() {
        let store = Arc::new(InMemoryStateStore::new());
        let election = Arc::new(MasterElection::new(store));
        election.try_elect(1000).await.unwrap();
        let lifecycle = Lifecycle::new(election, WaitGroup::new());

        lifecycle.pause(true, Vec::new()).await;
        assert_eq!(lifecycle.state().await, LifecycleState::Paused);

        lifecycle.resume(|| true, || async {}).await;
        assert_eq!(lifecycle.state().await, LifecycleState::Running);
    }

    #[tokio::test]
    async fn stop_waits_for_wait_group_to_drain() {
        let store = Arc::new(InMemoryStateStore::new());
        let election = Arc::new(MasterElection::new(store));
        let wg = WaitGroup::new();
        wg.inc().await;
        let lifecycle = Lifecycle::new(election, wg.clone());

        let handle = tokio::spawn({
            let lifecycle_wg = wg.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                lifecycle_wg.dec().await;
            }
        });

        lifecycle.stop(true, Vec::new()).await;
        assert_eq!(lifecycle.state().await, LifecycleState::Stopping);
        handle.await.unwrap();
    }
}
