use serde::{Deserialize, Serialize};

/// A check's execution severity. Maps from the numeric status table in
/// spec §3: `0 -> Ok, 1 -> Warning, 2 -> Critical`, anything else `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }
}

impl From<i64> for Severity {
    fn from(status: i64) -> Self {
        match status {
            0 => Self::Ok,
            1 => Self::Warning,
            2 => Self::Critical,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_table() {
        assert_eq!(Severity::from(0), Severity::Ok);
        assert_eq!(Severity::from(1), Severity::Warning);
        assert_eq!(Severity::from(2), Severity::Critical);
        assert_eq!(Severity::from(3), Severity::Unknown);
        assert_eq!(Severity::from(-1), Severity::Unknown);
        assert_eq!(Severity::from(99), Severity::Unknown);
    }
}
