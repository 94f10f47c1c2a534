//! Filter evaluator (spec §4.2): recursive attribute matching with
//! optional sandboxed `eval:` predicates.

use serde_json::Value;
use tracing::warn;

use crate::config::Registry;
use crate::sandbox;

const EVAL_PREFIX: &str = "eval:";

/// Recursively walk `template`, requiring every key to match `candidate`
/// (spec §4.2). `template` must be a JSON object; a non-object template is
/// never a match (there is nothing to walk).
#[must_use]
pub fn attributes_match(template: &Value, candidate: &Value) -> bool {
    let Some(template_obj) = template.as_object() else {
        return false;
    };
    let candidate_obj = candidate.as_object();

    template_obj.iter().all(|(key, template_value)| {
        let candidate_value = candidate_obj.and_then(|o| o.get(key)).cloned().unwrap_or(Value::Null);
        match_value(template_value, &candidate_value)
    })
}

fn match_value(template_value: &Value, candidate_value: &Value) -> bool {
    match template_value {
        Value::Object(_) => candidate_value.is_object() && attributes_match(template_value, candidate_value),
        Value::String(s) if s.starts_with(EVAL_PREFIX) => {
            let expr = s[EVAL_PREFIX.len()..].trim_start();
            sandbox::eval(expr, candidate_value).unwrap_or(false)
        }
        scalar => scalar == candidate_value,
    }
}

/// `event_filtered` (spec §4.2). A non-negated filter drops events that do
/// *not* match; a negated filter drops events that *do* match. An unknown
/// filter is logged and treated as "do not drop" (never silently swallows
/// the event).
#[must_use]
pub fn event_filtered(registry: &Registry, filter_name: &str, event: &Value) -> bool {
    let Some(filter) = registry.filter(filter_name) else {
        warn!(filter = filter_name, "unknown filter");
        return false;
    };

    let template = Value::Object(filter.attributes.clone());
    let matched = attributes_match(&template, event);
    if filter.negate {
        matched
    } else {
        !matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equal_scalars_match() {
        let template = json!({"status": 2});
        let candidate = json!({"status": 2, "extra": "x"});
        assert!(attributes_match(&template, &candidate));
    }

    #[test]
    fn mismatched_scalar_fails() {
        let template = json!({"status": 2});
        let candidate = json!({"status": 0});
        assert!(!attributes_match(&template, &candidate));
    }

    #[test]
    fn nested_mapping_recurses() {
        let template = json!({"check": {"name": "cpu"}});
        let candidate = json!({"check": {"name": "cpu", "status": 2}});
        assert!(attributes_match(&template, &candidate));
    }

    #[test]
    fn eval_prefix_runs_sandboxed_predicate() {
        let template = json!({"status": "eval: value > 1"});
        assert!(attributes_match(&template, &json!({"status": 2})));
        assert!(!attributes_match(&template, &json!({"status": 0})));
    }

    #[test]
    fn eval_error_counts_as_no_match() {
        let template = json!({"status": "eval: value >"});
        assert!(!attributes_match(&template, &json!({"status": 2})));
    }

    #[test]
    fn missing_candidate_key_is_no_match() {
        let template = json!({"status": 2});
        let candidate = json!({"other": 1});
        assert!(!attributes_match(&template, &candidate));
    }
}
