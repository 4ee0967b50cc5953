//! Node configuration types

use crate::error::NodeError;
use harbor_core::party::{PartyDescriptor, DEFAULT_INITIAL_BALANCE};
use harbor_core::types::PartyId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix of environment overrides, e.g. `HARBOR__RPC__ADDRESS`
pub const ENV_PREFIX: &str = "HARBOR";

/// Complete node configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Identity of this node
    #[serde(default)]
    pub node: NodeSettings,

    /// Peer communication
    #[serde(default)]
    pub network: NetworkConfig,

    /// Block production
    #[serde(default)]
    pub mining: MiningConfig,

    /// HTTP API settings
    #[serde(default)]
    pub rpc: RPCConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl NodeConfig {
    /// Layer an optional TOML file and `HARBOR__*` environment variables
    /// over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, NodeError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self, NodeError> {
        toml::from_str(content).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Descriptor of this node's own party, when one is configured
    pub fn own_party(&self) -> Option<PartyDescriptor> {
        self.node.party_id.as_ref().map(|id| PartyDescriptor {
            id: id.clone(),
            name: self.node.name.clone(),
            address: self.node.address.clone(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.network.request_timeout_ms)
    }
}

/// Basic node settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Party this node acts for
    #[serde(default)]
    pub party_id: Option<PartyId>,

    /// Display name of the party
    #[serde(default = "default_node_name")]
    pub name: String,

    /// Base URL other nodes reach this one at
    #[serde(default = "default_node_address")]
    pub address: String,

    /// Balance assigned to every newly registered party
    #[serde(default = "default_initial_balance")]
    pub initial_balance: i64,
}

fn default_node_name() -> String {
    "harbor-node".to_string()
}

fn default_node_address() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_initial_balance() -> i64 {
    DEFAULT_INITIAL_BALANCE
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            party_id: None,
            name: default_node_name(),
            address: default_node_address(),
            initial_balance: default_initial_balance(),
        }
    }
}

/// Network configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Timeout for a peer chain fetch or an oracle query, in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Parties registered at boot
    #[serde(default)]
    pub peers: Vec<PartyDescriptor>,
}

fn default_request_timeout() -> u64 {
    5000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout(),
            peers: Vec::new(),
        }
    }
}

/// Mining configuration.
///
/// Difficulty is fixed network-wide and not configurable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Run a settlement pass after every mined block
    #[serde(default = "default_true")]
    pub settle_after_mine: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            settle_after_mine: true,
        }
    }
}

/// RPC configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RPCConfig {
    /// Enable the HTTP API
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Listen address
    #[serde(default = "default_rpc_address")]
    pub address: String,

    /// Allow cross-origin requests
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

fn default_rpc_address() -> String {
    "0.0.0.0:5000".to_string()
}

impl Default for RPCConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_rpc_address(),
            cors_enabled: true,
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Metrics configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Standalone Prometheus listener address
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

fn default_metrics_address() -> String {
    "127.0.0.1:9615".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_metrics_address(),
        }
    }
}
