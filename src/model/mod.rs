//! Core data model: clients, checks, results, history, events, and
//! aggregation records (spec §3).
//!
//! These types are intentionally plain serde structs over JSON — there is
//! no schema version field, and unknown keys are ignored on deserialize
//! (forward-compatibility by extra-keys-ignored, per spec §6).

mod aggregate;
mod check;
mod client;
mod event;
mod history;
mod result;
mod severity;

pub use aggregate::{AggregateCounters, AggregationEntry};
pub use check::{CheckConfig, EffectiveCheck, HandlerRef, Subdue, SubdueGate, SubdueWindow};
pub use client::Client;
pub use event::{Action, DispatchEvent, EventOccurrence};
pub use history::{History, MAX_HISTORY};
pub use result::{CheckResult, ResultCheck};
pub use severity::Severity;
