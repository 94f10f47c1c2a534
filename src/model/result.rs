use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A transient result message as published to the `results` queue (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub client: String,
    pub check: ResultCheck,
}

/// The `check` object carried on a [`CheckResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultCheck {
    pub name: String,
    pub status: i64,
    pub output: String,
    pub issued: i64,

    /// Present when the agent echoes the check definition's handler(s)
    /// for a check that has no matching config entry (ad-hoc checks).
    pub handler: Option<String>,
    pub handlers: Option<Vec<String>>,
    #[serde(rename = "type")]
    pub check_type: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_payload() {
        let json = serde_json::json!({
            "client": "web-1",
            "check": {
                "name": "cpu",
                "status": 2,
                "output": "load too high",
                "issued": 1_700_000_000,
            }
        });
        let result: CheckResult = serde_json::from_value(json).unwrap();
        assert_eq!(result.client, "web-1");
        assert_eq!(result.check.status, 2);
        assert!(result.check.handler.is_none());
    }
}
