use serde::{Deserialize, Serialize};

use super::check::EffectiveCheck;

/// The action tag attached to a dispatched event (spec §4.6 step 7).
///
/// `None` is the resolved Open Question for `check.type == "metric"` events
/// with no previous occurrence: they dispatch with no action tag. Handlers
/// gated on `action == flapping` never match `Action::None` (see
/// `handler::resolver`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Flapping,
    Resolve,
    None,
}

/// An event occurrence stored at `events:<client>[<check>]` (spec §3).
/// Present iff the check is currently non-OK or flapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventOccurrence {
    pub output: String,
    pub status: i64,
    pub issued: i64,
    #[serde(default)]
    pub handlers: Vec<String>,
    pub flapping: bool,
    pub occurrences: u64,
}

/// The fully-resolved event handed to the resolver, mutator, and
/// dispatcher (spec §4.3-§4.5): the merged check plus the action tag and
/// occurrence bookkeeping. This is also the canonical payload serialized
/// to handlers when no mutator is configured (spec §8's mutator law).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEvent {
    pub client: String,
    pub check: EffectiveCheck,
    pub action: Action,
    pub occurrences: u64,
    pub flapping: bool,
}
