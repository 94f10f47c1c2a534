use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A client descriptor, persisted at `client:<name>` and tracked in the
/// `clients` set. The core never deletes clients (spec §3: "never deleted
/// by the core").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    pub name: String,
    pub timestamp: i64,

    /// Opaque fields the agent sent beyond `name`/`timestamp`, preserved
    /// round-trip.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Client {
    #[must_use]
    pub fn new(name: impl Into<String>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            timestamp,
            extra: BTreeMap::new(),
        }
    }
}
