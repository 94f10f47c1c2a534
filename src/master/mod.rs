//! Master election and lifecycle (spec §4.9).

mod election;
mod lifecycle;

pub use election::{MasterElection, LOCK_TTL_SECS, RENEWAL_PERIOD_SECS};
pub use lifecycle::{Lifecycle, LifecycleState};
