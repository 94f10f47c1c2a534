//! Key-value store keyspace (spec §3). Plain formatting helpers rather
//! than a query-builder abstraction, matching the teacher's preference for
//! concrete store accessor methods.

#[must_use]
pub fn client(name: &str) -> String {
    format!("client:{name}")
}

#[must_use]
pub fn clients() -> &'static str {
    "clients"
}

#[must_use]
pub fn history(client: &str, check: &str) -> String {
    format!("history:{client}:{check}")
}

#[must_use]
pub fn history_set(client: &str) -> String {
    format!("history:{client}")
}

#[must_use]
pub fn events(client: &str) -> String {
    format!("events:{client}")
}

#[must_use]
pub fn aggregate(name: &str, issued: i64) -> String {
    format!("aggregate:{name}:{issued}")
}

#[must_use]
pub fn aggregation(name: &str, issued: i64) -> String {
    format!("aggregation:{name}:{issued}")
}

#[must_use]
pub fn aggregates_for(name: &str) -> String {
    format!("aggregates:{name}")
}

#[must_use]
pub fn aggregates() -> &'static str {
    "aggregates"
}

#[must_use]
pub fn lock_master() -> &'static str {
    "lock:master"
}
