use serde::{Deserialize, Serialize};

/// Per-`(check_name, issued)` severity counters, stored at
/// `aggregate:<name>:<issued>` (spec §3, §4.11).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregateCounters {
    pub ok: u64,
    pub warning: u64,
    pub critical: u64,
    pub unknown: u64,
    pub total: u64,
}

impl AggregateCounters {
    pub fn increment(&mut self, severity: crate::model::Severity) {
        match severity {
            crate::model::Severity::Ok => self.ok += 1,
            crate::model::Severity::Warning => self.warning += 1,
            crate::model::Severity::Critical => self.critical += 1,
            crate::model::Severity::Unknown => self.unknown += 1,
        }
        self.total += 1;
    }
}

/// A single client's last-writer-wins entry in
/// `aggregation:<name>:<issued>` (spec §3, §4.11).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregationEntry {
    pub output: String,
    pub status: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;

    #[test]
    fn increments_correct_bucket_and_total() {
        let mut counters = AggregateCounters::default();
        counters.increment(Severity::Critical);
        counters.increment(Severity::Ok);
        assert_eq!(counters.critical, 1);
        assert_eq!(counters.ok, 1);
        assert_eq!(counters.total, 2);
    }
}
