use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::CheckConfig;

/// The on-disk configuration tree (spec §6 "config registry"), loaded by
/// [`super::loader::load`].
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
    #[serde(default)]
    pub handlers: HashMap<String, HandlerConfig>,
    #[serde(default)]
    pub mutators: HashMap<String, MutatorConfig>,
    #[serde(default)]
    pub filters: HashMap<String, FilterConfig>,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub broker: BrokerSettings,
    /// §6 "test hook": shortens intervals, disables pause-on-reconnect.
    #[serde(default)]
    pub testing: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandlerConfig {
    Pipe {
        command: String,
        #[serde(flatten)]
        common: HandlerCommon,
    },
    Tcp {
        socket: SocketTarget,
        #[serde(flatten)]
        common: HandlerCommon,
    },
    Udp {
        socket: SocketTarget,
        #[serde(flatten)]
        common: HandlerCommon,
    },
    Amqp {
        exchange: ExchangeTarget,
        #[serde(flatten)]
        common: HandlerCommon,
    },
    Set {
        handlers: Vec<String>,
        #[serde(flatten)]
        common: HandlerCommon,
    },
}

impl HandlerConfig {
    #[must_use]
    pub fn common(&self) -> &HandlerCommon {
        match self {
            HandlerConfig::Pipe { common, .. }
            | HandlerConfig::Tcp { common, .. }
            | HandlerConfig::Udp { common, .. }
            | HandlerConfig::Amqp { common, .. }
            | HandlerConfig::Set { common, .. } => common,
        }
    }
}

/// Gating fields shared by every handler type (spec §4.3 step 1/3/4).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct HandlerCommon {
    #[serde(default)]
    pub handle_flapping: bool,
    pub severities: Option<Vec<String>>,
    pub filter: Option<String>,
    pub filters: Option<Vec<String>>,
    /// Named mutator applied before this handler receives the event (spec
    /// §4.4/§4.5 step 2).
    pub mutator: Option<String>,
}

impl HandlerCommon {
    /// Normalized `filters` list, merging the singular/plural forms (spec
    /// §4.3 step 4: "has `filters`/`filter`").
    #[must_use]
    pub fn filter_list(&self) -> Vec<String> {
        if let Some(list) = &self.filters {
            return list.clone();
        }
        self.filter.clone().into_iter().collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SocketTarget {
    pub host: String,
    pub port: u16,
    /// Connect+idle timeout in seconds (spec §4.5, §5 default 10s).
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeTarget {
    pub name: String,
    #[serde(rename = "type", default = "default_exchange_type")]
    pub exchange_type: String,
    /// Remaining declaration options, passed through opaquely (spec §4.5:
    /// "passing remaining exchange keys as declaration options").
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

fn default_exchange_type() -> String {
    "direct".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MutatorConfig {
    /// A subprocess mutator runs this command with the event JSON on stdin
    /// (spec §4.4). Absent for extension-backed mutators, which are
    /// registered programmatically instead.
    pub command: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub negate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreSettings {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { url: default_redis_url() }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self { url: default_amqp_url() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerSettings {
    #[serde(default = "default_amqp_url")]
    pub url: String,
}

fn default_amqp_url() -> String {
    "amqp://127.0.0.1:5672/%2f".to_string()
}
