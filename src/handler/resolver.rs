//! Handler resolver (spec §4.3): expands handler names (including
//! one-level "sets") and gates them by flapping/subdue/severity/filter.

use std::collections::HashSet;

use tracing::warn;

use crate::config::{HandlerConfig, Registry, ResolvedHandler};
use crate::model::{Action, DispatchEvent, Severity, SubdueGate};

use super::subdue::check_subdued;

/// A handler ready for dispatch, tagged with the name it was resolved
/// under (spec §4.3: "include, tagged with `name`").
pub struct ExpandedHandler {
    pub name: String,
    pub resolved: ResolvedHandler,
}

/// `derive_handlers` (spec §4.3). Handler sets are expanded exactly one
/// level; a set referencing another set is illegal and is logged and
/// skipped rather than recursed into (invariant vi).
#[must_use]
pub fn derive_handlers(registry: &Registry, names: &[String]) -> Vec<ExpandedHandler> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for name in names {
        expand_one(registry, name, &mut out, &mut seen);
    }
    out
}

fn expand_one(registry: &Registry, name: &str, out: &mut Vec<ExpandedHandler>, seen: &mut HashSet<String>) {
    match registry.handler(name) {
        None => warn!(handler = name, "unknown handler"),
        Some(ResolvedHandler::Config(HandlerConfig::Set { handlers, .. })) => {
            for inner in &handlers {
                match registry.handler(inner) {
                    None => warn!(handler = inner.as_str(), "unknown handler"),
                    Some(ResolvedHandler::Config(HandlerConfig::Set { .. })) => {
                        warn!(handler = inner.as_str(), "nested handler sets are not allowed");
                    }
                    Some(resolved) => push(out, seen, inner.clone(), resolved),
                }
            }
        }
        Some(resolved) => push(out, seen, name.to_string(), resolved),
    }
}

fn push(out: &mut Vec<ExpandedHandler>, seen: &mut HashSet<String>, tag: String, resolved: ResolvedHandler) {
    if seen.insert(tag.clone()) {
        out.push(ExpandedHandler { name: tag, resolved });
    }
}

/// `event_handlers` (spec §4.3): resolve `event.check.handlers`, then gate
/// each in order against flapping/subdue/severity/filters.
#[must_use]
pub fn event_handlers(registry: &Registry, event: &DispatchEvent) -> Vec<ExpandedHandler> {
    let expanded = derive_handlers(registry, &event.check.handlers);
    let event_json = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
    let severity = Severity::from(event.check.status).as_str();

    expanded
        .into_iter()
        .filter(|h| {
            let common = match &h.resolved {
                ResolvedHandler::Config(cfg) => cfg.common().clone(),
                ResolvedHandler::Extension(_) => Default::default(),
            };

            if event.action == Action::Flapping && !common.handle_flapping {
                return false;
            }
            if check_subdued(event.check.subdue.as_ref(), SubdueGate::Handler) {
                return false;
            }
            if let Some(severities) = &common.severities {
                if !severities.iter().any(|s| s == severity) && event.action != Action::Resolve {
                    return false;
                }
            }
            for filter_name in common.filter_list() {
                if crate::filter::event_filtered(registry, &filter_name, &event_json) {
                    return false;
                }
            }
            true
        })
        .collect()
}
