//! # Harbor Node
//!
//! A full ledger node: one [`NodeContext`] owning the chain, pending pool
//! and party registry behind a single writer lock, a cancellable background
//! miner, HTTP clients for peer chains and oracles, and the HTTP API.

pub mod config;
pub mod context;
pub mod error;
pub mod http_client;
pub mod metrics;
pub mod miner;
pub mod node;
pub mod rpc_server;

pub use config::NodeConfig;
pub use context::NodeContext;
pub use error::{NodeError, Result};
pub use http_client::HttpPeers;
pub use metrics::NodeMetrics;
pub use miner::{Miner, MiningJob};
pub use node::{HarborNode, NodeState};
