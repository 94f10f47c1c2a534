//! # Sentrix
//!
//! Sentrix is the central event-processing server of a distributed
//! monitoring platform. Clients run checks and publish raw results to a
//! broker; this server consumes them, tracks per-check history, detects
//! flapping, derives create/resolve/flapping events, and dispatches those
//! events to configured handlers under filter and subdue-policy gating.
//! A single master, chosen by a lock held in the key-value store, also
//! runs the check-request scheduler and the stale-client watchdog.
//!
//! ## Core Concepts
//!
//! - **Client**: a monitored node that sends keepalives and results
//! - **Check**: a named unit of work whose config merges with each result
//! - **History**: a bounded ring of recent statuses per client/check pair
//! - **Event**: a create, resolve, flapping, or metric derivation fed to handlers
//! - **Handler**: a pipe, tcp, udp, amqp, set, or extension dispatch target
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sentrix::config::{self, Registry};
//! use sentrix::reactor::Reactor;
//! use sentrix::store::RedisStateStore;
//! use sentrix::broker::AmqpBroker;
//! use std::sync::Arc;
//!
//! let config = config::load("sentrix.yaml".as_ref())?;
//! let store = Arc::new(RedisStateStore::connect(&config.store.url).await?);
//! let broker = Arc::new(AmqpBroker::connect(&config.broker.url).await?);
//! let registry = Arc::new(Registry::new(config));
//! Arc::new(Reactor::new(registry, store, broker)).run().await;
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod broker;
pub mod config;
pub mod connection;
pub mod error;
pub mod filter;
pub mod handler;
pub mod keepalive;
pub mod keys;
pub mod master;
pub mod model;
pub mod process;
pub mod processing;
pub mod publisher;
pub mod reactor;
pub mod sandbox;
pub mod store;
pub mod watchdog;

pub use connection::ConnectionEvent;
pub use error::{SentrixError, SentrixResult};
pub use model::{
    Action, AggregateCounters, AggregationEntry, CheckConfig, CheckResult, Client, DispatchEvent,
    EffectiveCheck, EventOccurrence, HandlerRef, History, ResultCheck, Severity, Subdue, SubdueGate,
    SubdueWindow, MAX_HISTORY,
};
pub use reactor::Reactor;
