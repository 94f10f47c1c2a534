//! Result processing pipeline: result processor, aggregator, and
//! aggregation pruner (spec §4.6, §4.11, §4.12).

mod aggregate;
mod result;

pub use aggregate::{aggregate_result, prune_once};
pub use result::process_result;
