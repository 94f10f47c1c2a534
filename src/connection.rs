//! Backend connection lifecycle events (spec §4.9/§6).
//!
//! `StateStore` and `Broker` each expose a `connection_events` stream
//! instead of raw `on_error`/`before_reconnect`/`after_reconnect`
//! callbacks: the reactor already drains everything else (deliveries,
//! timers) through `tokio::sync::mpsc` channels in a single select loop
//! (spec §5), so backend health is reported the same way rather than via
//! registered closures. `Reactor` drains this channel and drives
//! `Lifecycle::pause`/`resume`/`stop` from it, which is exactly what the
//! three named hooks are for.

/// One transition in a backend's connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The backend reported a connection error it cannot recover from by
    /// itself (`on_error`).
    Error(String),
    /// The backend has noticed it is disconnected and started reconnecting
    /// (`before_reconnect`).
    ReconnectStart,
    /// The backend has re-established its connection (`after_reconnect`).
    ReconnectSuccess,
}
