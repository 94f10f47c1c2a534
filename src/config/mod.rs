//! Configuration loading and the read-only config registry (spec §6).

mod extension;
mod loader;
mod model;
mod registry;

pub use extension::{HandlerExtension, MutatorExtension};
pub use loader::load;
pub use model::{
    BrokerSettings, Config, ExchangeTarget, FilterConfig, HandlerCommon, HandlerConfig, MutatorConfig,
    SocketTarget, StoreSettings,
};
pub use registry::{Registry, ResolvedHandler, ResolvedMutator};
