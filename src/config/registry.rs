use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::model::CheckConfig;

use super::extension::{HandlerExtension, MutatorExtension};
use super::model::{Config, FilterConfig, HandlerConfig, MutatorConfig};

/// A handler lookup result (spec §4.3): either a config-defined handler
/// (pipe/tcp/udp/amqp/set) or a programmatically registered extension.
pub enum ResolvedHandler {
    Config(HandlerConfig),
    Extension(Arc<dyn HandlerExtension>),
}

/// A mutator lookup result (spec §4.4).
pub enum ResolvedMutator {
    Config(MutatorConfig),
    Extension(Arc<dyn MutatorExtension>),
}

/// Read-only accessors over the loaded configuration (spec §6 "config
/// registry"): checks, handlers, mutators, filters, extensions, plus a flat
/// `to_hash` snapshot handed to extensions.
pub struct Registry {
    config: Config,
    handler_extensions: HashMap<String, Arc<dyn HandlerExtension>>,
    mutator_extensions: HashMap<String, Arc<dyn MutatorExtension>>,
}

impl Registry {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config, handler_extensions: HashMap::new(), mutator_extensions: HashMap::new() }
    }

    pub fn register_handler_extension(&mut self, name: impl Into<String>, ext: Arc<dyn HandlerExtension>) {
        self.handler_extensions.insert(name.into(), ext);
    }

    pub fn register_mutator_extension(&mut self, name: impl Into<String>, ext: Arc<dyn MutatorExtension>) {
        self.mutator_extensions.insert(name.into(), ext);
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn testing(&self) -> bool {
        self.config.testing
    }

    #[must_use]
    pub fn checks(&self) -> &[CheckConfig] {
        &self.config.checks
    }

    #[must_use]
    pub fn check(&self, name: &str) -> Option<&CheckConfig> {
        self.config.checks.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn handler(&self, name: &str) -> Option<ResolvedHandler> {
        if let Some(ext) = self.handler_extensions.get(name) {
            return Some(ResolvedHandler::Extension(ext.clone()));
        }
        self.config.handlers.get(name).cloned().map(ResolvedHandler::Config)
    }

    #[must_use]
    pub fn mutator(&self, name: &str) -> Option<ResolvedMutator> {
        if let Some(ext) = self.mutator_extensions.get(name) {
            return Some(ResolvedMutator::Extension(ext.clone()));
        }
        self.config.mutators.get(name).cloned().map(ResolvedMutator::Config)
    }

    #[must_use]
    pub fn filter(&self, name: &str) -> Option<&FilterConfig> {
        self.config.filters.get(name)
    }

    /// A flat snapshot of the loaded config, handed to extension handlers
    /// and mutators as a settings argument (spec §6).
    #[must_use]
    pub fn to_hash(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or(Value::Null)
    }
}
