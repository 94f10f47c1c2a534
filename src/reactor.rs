//! The reactor (spec §5): a single Tokio task tree that owns all mutable
//! server state and is driven by the broker, timers, and signals — the
//! asynchronous pipeline-of-continuations architecture §9 calls for in
//! place of the source's callback pyramid.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::broker::Broker;
use crate::config::Registry;
use crate::connection::ConnectionEvent;
use crate::error::FatalError;
use crate::handler::{handle_event, WaitGroup};
use crate::keepalive;
use crate::master::{Lifecycle, MasterElection, RENEWAL_PERIOD_SECS};
use crate::model::CheckResult;
use crate::processing::{prune_once, process_result};
use crate::publisher;
use crate::store::StateStore;
use crate::watchdog;

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// Owns the long-lived collaborators and wires the pipelines of spec §4
/// together. Constructed once in `main`.
pub struct Reactor {
    pub registry: Arc<Registry>,
    pub store: Arc<dyn StateStore>,
    pub broker: Arc<dyn Broker>,
    pub election: Arc<MasterElection>,
    pub lifecycle: Arc<Lifecycle>,
    pub wait_group: WaitGroup,
    fatal_tx: mpsc::Sender<FatalError>,
    fatal_rx: AsyncMutex<mpsc::Receiver<FatalError>>,
}

impl Reactor {
    #[must_use]
    pub fn new(registry: Arc<Registry>, store: Arc<dyn StateStore>, broker: Arc<dyn Broker>) -> Self {
        let election = Arc::new(MasterElection::new(store.clone()));
        let wait_group = WaitGroup::new();
        let lifecycle = Arc::new(Lifecycle::new(election.clone(), wait_group.clone()));
        let (fatal_tx, fatal_rx) = mpsc::channel(1);
        Self {
            registry,
            store,
            broker,
            election,
            lifecycle,
            wait_group,
            fatal_tx,
            fatal_rx: AsyncMutex::new(fatal_rx),
        }
    }

    /// Spawns the results pipeline: consume `results`, run the processor,
    /// dispatch whatever event it produces. Also used to re-subscribe
    /// after a broker reconnect (spec §4.9: "re-arm prefetch").
    fn spawn_result_pipeline(&self) -> JoinHandle<()> {
        spawn_results_consumer(self.broker.clone(), self.store.clone(), self.registry.clone(), self.wait_group.clone())
    }

    fn spawn_keepalive_pipeline(&self) -> JoinHandle<()> {
        spawn_keepalive_consumer(self.broker.clone(), self.store.clone())
    }

    /// Election/renewal loop (spec §4.9): every [`RENEWAL_PERIOD_SECS`],
    /// renew if master, else attempt election. When mastership is gained,
    /// start the master-only duties (§4.8 publisher, §4.10 watchdog, §4.12
    /// pruner); when lost, their timers were already cancelled by
    /// `resign`.
    fn spawn_election_loop(&self) -> JoinHandle<()> {
        let election = self.election.clone();
        let lifecycle = self.lifecycle.clone();
        let registry = self.registry.clone();
        let broker = self.broker.clone();
        let store = self.store.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(RENEWAL_PERIOD_SECS));
            let mut was_master = false;
            loop {
                interval.tick().await;
                if let Err(e) = election.renew_or_elect(now_unix()).await {
                    warn!(error = %e, "master election tick failed");
                }
                let is_master = election.is_master();
                if is_master && !was_master {
                    info!("became master, starting master-only duties");
                    start_master_duties(&lifecycle, &registry, &broker, &store).await;
                }
                was_master = is_master;
            }
        })
    }

    /// Drains the key-value store's connection lifecycle events and drives
    /// `Lifecycle` accordingly (spec §4.9 backend disconnect policy):
    /// a connection error is fatal and initiates stop; a reconnect start
    /// pauses (skipped in test mode, since the test harness has no real
    /// backend to reconnect to); a reconnect success resumes.
    fn spawn_store_health_loop(&self) -> JoinHandle<()> {
        let mut events = self.store.connection_events();
        let lifecycle = self.lifecycle.clone();
        let store = self.store.clone();
        let registry = self.registry.clone();
        let fatal_tx = self.fatal_tx.clone();

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ConnectionEvent::Error(reason) => {
                        error!(error = %reason, "key-value store connection error, initiating stop");
                        let _ = fatal_tx.send(FatalError::Store(reason)).await;
                    }
                    ConnectionEvent::ReconnectStart => {
                        if registry.testing() {
                            info!("store reconnect started, skipping pause (test mode)");
                            continue;
                        }
                        warn!("key-value store reconnecting, pausing");
                        lifecycle.pause(false, Vec::new()).await;
                    }
                    ConnectionEvent::ReconnectSuccess => {
                        info!("key-value store reconnected, resuming");
                        let store = store.clone();
                        lifecycle.resume(|| true, || async move { let _ = store.connected().await; }).await;
                    }
                }
            }
        })
    }

    /// Drains the broker's connection lifecycle events (spec §4.9): a
    /// connection error is fatal and initiates stop; a reconnect start
    /// resigns as master (the publisher/watchdog/pruner have nothing to
    /// publish to); a reconnect success re-subscribes both queues, which
    /// re-arms prefetch = 1 as a side effect of `consume`.
    fn spawn_broker_health_loop(&self) -> JoinHandle<()> {
        let mut events = self.broker.connection_events();
        let lifecycle = self.lifecycle.clone();
        let broker = self.broker.clone();
        let store = self.store.clone();
        let registry = self.registry.clone();
        let wait_group = self.wait_group.clone();
        let fatal_tx = self.fatal_tx.clone();

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ConnectionEvent::Error(reason) => {
                        error!(error = %reason, "broker connection error, initiating stop");
                        let _ = fatal_tx.send(FatalError::Broker(reason)).await;
                    }
                    ConnectionEvent::ReconnectStart => {
                        warn!("broker reconnecting, resigning as master");
                        lifecycle.resign(store.connected().await).await;
                    }
                    ConnectionEvent::ReconnectSuccess => {
                        info!("broker reconnected, re-subscribing to re-arm prefetch");
                        let results = spawn_results_consumer(broker.clone(), store.clone(), registry.clone(), wait_group.clone());
                        let keepalives = spawn_keepalive_consumer(broker.clone(), store.clone());
                        lifecycle.register_non_master_timer(results).await;
                        lifecycle.register_non_master_timer(keepalives).await;
                    }
                }
            }
        })
    }

    /// Runs until a shutdown signal is received, or a backend reports a
    /// fatal connection error (spec §4.9 backend disconnect policy).
    pub async fn run(self: Arc<Self>) {
        let _results = self.spawn_result_pipeline();
        let _keepalives = self.spawn_keepalive_pipeline();
        let _election = self.spawn_election_loop();
        let _store_health = self.spawn_store_health_loop();
        let _broker_health = self.spawn_broker_health_loop();

        let mut fatal_rx = self.fatal_rx.lock().await;
        tokio::select! {
            () = wait_for_shutdown_signal() => {
                info!("shutdown signal received, stopping");
            }
            fatal = fatal_rx.recv() => {
                if let Some(err) = fatal {
                    error!(error = %err, "fatal backend error, stopping");
                }
            }
        }
        self.lifecycle.stop(self.store.connected().await, Vec::new()).await;
    }
}

fn spawn_results_consumer(
    broker: Arc<dyn Broker>,
    store: Arc<dyn StateStore>,
    registry: Arc<Registry>,
    wait_group: WaitGroup,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = broker.cancel_consumers("results").await {
            warn!(error = %e, "failed to cancel existing results consumers before subscribing");
        }
        let mut deliveries = match broker.consume("results", 1).await {
            Ok(rx) => rx,
            Err(e) => {
                error!(error = %e, "failed to subscribe to results queue");
                return;
            }
        };
        info!("subscribed to results queue");

        while let Some(delivery) = deliveries.recv().await {
            match serde_json::from_slice::<CheckResult>(&delivery.payload) {
                Ok(result) => match process_result(store.as_ref(), &registry, result).await {
                    Ok(Some(event)) => {
                        handle_event(registry.clone(), broker.clone(), wait_group.clone(), event).await;
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "result processing failed"),
                },
                Err(e) => warn!(error = %e, "malformed result payload, dropping"),
            }
            delivery.ack();
        }
    })
}

fn spawn_keepalive_consumer(broker: Arc<dyn Broker>, store: Arc<dyn StateStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = keepalive::run(broker, store).await {
            error!(error = %e, "keepalive consumer exited");
        }
    })
}

async fn start_master_duties(
    lifecycle: &Arc<Lifecycle>,
    registry: &Arc<Registry>,
    broker: &Arc<dyn Broker>,
    store: &Arc<dyn StateStore>,
) {
    let publisher_handles = publisher::spawn_all(registry.clone(), broker.clone(), now_unix);
    for handle in publisher_handles {
        lifecycle.register_master_timer(handle).await;
    }

    let watchdog_broker = broker.clone();
    let watchdog_store = store.clone();
    lifecycle
        .register_master_timer(tokio::spawn(async move {
            watchdog::run(watchdog_broker, watchdog_store, now_unix).await;
        }))
        .await;

    let pruner_store = store.clone();
    lifecycle
        .register_master_timer(tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(20));
            loop {
                interval.tick().await;
                if let Err(e) = prune_once(pruner_store.as_ref()).await {
                    warn!(error = %e, "aggregation pruner tick failed");
                }
            }
        }))
        .await;
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut interrupt = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
