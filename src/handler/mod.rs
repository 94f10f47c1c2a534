//! Handler resolution, subdue policy, mutator dispatch, and event
//! dispatch (spec §4.3-§4.5).

mod dispatch;
mod mutator;
mod resolver;
mod subdue;

pub use dispatch::{handle_event, WaitGroup};
pub use mutator::mutate;
pub use resolver::{derive_handlers, event_handlers, ExpandedHandler};
pub use subdue::check_subdued;
