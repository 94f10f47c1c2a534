use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::result::CheckResult;

/// A check definition from config (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CheckConfig {
    pub name: String,
    pub command: Option<String>,
    pub interval: Option<u64>,
    #[serde(default)]
    pub subscribers: Vec<String>,
    pub publish: Option<bool>,
    pub standalone: Option<bool>,
    pub aggregate: Option<bool>,
    pub handle: Option<bool>,
    pub handler: Option<String>,
    pub handlers: Option<Vec<String>>,
    #[serde(rename = "type")]
    pub check_type: Option<String>,
    pub auto_resolve: Option<bool>,
    pub force_resolve: Option<bool>,
    pub low_flap_threshold: Option<u32>,
    pub high_flap_threshold: Option<u32>,
    pub subdue: Option<Subdue>,

    /// Any additional config keys, carried through to the effective check's
    /// extra bag so filters can match on them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A subdue time/weekday window, used both at the top level of a check
/// (spec §4.3 `check_subdued`) and for its `exceptions`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Subdue {
    /// Window start, `"HH:MM"` 24h, inclusive.
    pub begin: Option<String>,
    /// Window end, `"HH:MM"` 24h, inclusive. If `end < begin` the window
    /// wraps past midnight.
    pub end: Option<String>,
    /// Weekday names (lowercase, e.g. `"monday"`) during which the check is
    /// subdued for the whole day.
    #[serde(default)]
    pub days: Vec<String>,
    /// Windows that, if the current time falls inside one, cancel the
    /// subdue (the check is *not* subdued during an exception).
    #[serde(default)]
    pub exceptions: Vec<SubdueWindow>,
    /// Which gate this subdue applies to: `handler` (default) or
    /// `publisher`.
    #[serde(default)]
    pub at: SubdueGate,
}

/// A bare time/weekday window, used for `exceptions`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SubdueWindow {
    pub begin: Option<String>,
    pub end: Option<String>,
    #[serde(default)]
    pub days: Vec<String>,
}

/// Which gate a subdue window applies to (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubdueGate {
    #[default]
    Handler,
    Publisher,
}

/// A config-referenced handler name, used when expanding `event.check.handlers`
/// or `event.check.handler`. Kept as a thin wrapper purely for call-site
/// readability at the resolver boundary.
pub type HandlerRef = String;

/// The merged view of a config check definition and a result's `check`
/// object (spec §4.6 step 2): "the result wins on conflicts except for
/// check-definition-only keys."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveCheck {
    pub name: String,
    pub status: i64,
    pub output: String,
    pub issued: i64,

    pub command: Option<String>,
    #[serde(default)]
    pub subscribers: Vec<String>,
    pub publish: Option<bool>,
    pub standalone: Option<bool>,
    #[serde(default)]
    pub aggregate: bool,
    #[serde(default = "default_true")]
    pub handle: bool,
    #[serde(default)]
    pub handlers: Vec<String>,
    #[serde(rename = "type")]
    pub check_type: Option<String>,
    #[serde(default = "default_true")]
    pub auto_resolve: bool,
    #[serde(default)]
    pub force_resolve: bool,
    pub low_flap_threshold: Option<u32>,
    pub high_flap_threshold: Option<u32>,
    pub subdue: Option<Subdue>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

/// Config keys that are "check-definition-only": when the config defines
/// this check, its value is authoritative regardless of what the result
/// carries (spec §4.6 step 2).
const DEFINITION_ONLY_KEYS: &[&str] = &[
    "command",
    "subscribers",
    "publish",
    "standalone",
    "aggregate",
    "handle",
    "handler",
    "handlers",
    "type",
    "auto_resolve",
    "force_resolve",
    "low_flap_threshold",
    "high_flap_threshold",
    "subdue",
];

impl EffectiveCheck {
    /// Merge a config check definition (if any) over a result's check
    /// payload.
    #[must_use]
    pub fn merge(config: Option<&CheckConfig>, result: &CheckResult) -> Self {
        let handlers = match config {
            Some(c) => normalize_handlers(c.handler.as_deref(), c.handlers.as_deref()),
            None => normalize_handlers(
                result.check.handler.as_deref(),
                result.check.handlers.as_deref(),
            ),
        };

        let mut extra = result.check.extra.clone();
        if let Some(c) = config {
            for (k, v) in &c.extra {
                if !DEFINITION_ONLY_KEYS.contains(&k.as_str()) {
                    // Config extras fill gaps the result didn't specify;
                    // the result still wins on genuine conflicts.
                    extra.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }

        Self {
            name: result.check.name.clone(),
            status: result.check.status,
            output: result.check.output.clone(),
            issued: result.check.issued,
            command: config.and_then(|c| c.command.clone()),
            subscribers: config.map(|c| c.subscribers.clone()).unwrap_or_default(),
            publish: config.and_then(|c| c.publish),
            standalone: config.and_then(|c| c.standalone),
            aggregate: config.and_then(|c| c.aggregate).unwrap_or(false),
            handle: config.and_then(|c| c.handle).unwrap_or(true),
            handlers,
            check_type: config
                .and_then(|c| c.check_type.clone())
                .or_else(|| result.check.check_type.clone()),
            auto_resolve: config.and_then(|c| c.auto_resolve).unwrap_or(true),
            force_resolve: config.and_then(|c| c.force_resolve).unwrap_or(false),
            low_flap_threshold: config.and_then(|c| c.low_flap_threshold),
            high_flap_threshold: config.and_then(|c| c.high_flap_threshold),
            subdue: config.and_then(|c| c.subdue.clone()),
            extra,
        }
    }
}

/// `event_handlers`'s source list (spec §4.3): `check.handlers`, else
/// `check.handler`, else `["default"]`.
fn normalize_handlers(handler: Option<&str>, handlers: Option<&[String]>) -> Vec<String> {
    if let Some(list) = handlers {
        if !list.is_empty() {
            return list.to_vec();
        }
    }
    if let Some(h) = handler {
        return vec![h.to_string()];
    }
    vec!["default".to_string()]
}
