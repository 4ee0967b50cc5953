//! Harbor CLI
//!
//! Runs a ledger node, or drives a running one over its HTTP API.

use clap::{Parser, Subcommand};
use harbor_core::types::PartyId;
use harbor_node::config::LoggingConfig;
use harbor_node::{HarborNode, NodeConfig};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "harbor")]
#[command(author = "Harbor Ledger Developers")]
#[command(version)]
#[command(about = "Harbor - replicated settlement ledger for seaports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Node to talk to
    #[arg(long, global = true, env = "HARBOR_NODE", default_value = "http://127.0.0.1:5000")]
    node: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a Harbor node
    Node {
        /// Configuration file path
        #[arg(short, long, default_value = "harbor.toml")]
        config: PathBuf,

        /// Party this node acts for (overrides the file)
        #[arg(long)]
        party_id: Option<String>,

        /// HTTP listen address (overrides the file)
        #[arg(long)]
        listen: Option<String>,
    },

    /// Print the effective configuration
    Config {
        /// Configuration file path
        #[arg(short, long, default_value = "harbor.toml")]
        config: PathBuf,
    },

    /// Show the node's chain
    Chain,

    /// Mine the pending contracts into a block
    Mine,

    /// Run consensus resolution
    Resolve,

    /// Show the node's own port
    Port,

    /// Register a peer port
    Register {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// Base URL of the port's node
        #[arg(long)]
        address: String,
    },

    /// Submit a contract
    Submit {
        /// Source port id
        #[arg(long)]
        from: String,
        /// Destination port id
        #[arg(long)]
        to: String,
        #[arg(long)]
        cost: i64,
        /// Contract id (generated by the node when omitted)
        #[arg(long)]
        uuid: Option<String>,
    },

    /// Mark a contract confirmed at this node's oracle
    Confirm {
        /// Contract id
        id: String,
    },
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false))
            .init();
    }
}

/// Thin HTTP client for a running node
struct NodeClient {
    base: String,
    http: reqwest::Client,
}

impl NodeClient {
    fn new(base: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get(&self, path: &str) -> anyhow::Result<Value> {
        let response = self.http.get(format!("{}{}", self.base, path)).send().await?;
        Self::read(response).await
    }

    async fn post(&self, path: &str, body: Value) -> anyhow::Result<Value> {
        let response = self
            .http
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn read(response: reqwest::Response) -> anyhow::Result<Value> {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            anyhow::bail!("node answered {}: {}", status, body);
        }
        Ok(body)
    }
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Node { config, .. } | Commands::Config { config } => NodeConfig::load(Some(config.as_path()))?,
        _ => NodeConfig::default(),
    };
    init_logging(cli.verbose, &config.logging);

    match cli.command {
        Commands::Node { party_id, listen, .. } => {
            let mut config = config;
            if let Some(id) = party_id {
                config.node.party_id = Some(PartyId::new(id));
            }
            if let Some(listen) = listen {
                config.rpc.address = listen;
            }

            let node = HarborNode::new(config)?;
            node.run().await?;
        }

        Commands::Config { .. } => {
            print!("{}", config.to_toml()?);
        }

        Commands::Chain => {
            let client = NodeClient::new(&cli.node)?;
            print_json(&client.get("/chain").await?)?;
        }

        Commands::Mine => {
            let client = NodeClient::new(&cli.node)?;
            print_json(&client.get("/mine").await?)?;
        }

        Commands::Resolve => {
            let client = NodeClient::new(&cli.node)?;
            let body = client.get("/nodes/resolve").await?;
            println!("{}", body["message"].as_str().unwrap_or_default());
        }

        Commands::Port => {
            let client = NodeClient::new(&cli.node)?;
            print_json(&client.get("/port").await?)?;
        }

        Commands::Register { id, name, address } => {
            let client = NodeClient::new(&cli.node)?;
            let body = json!({ "nodes": [{ "id": id, "name": name, "address": address }] });
            print_json(&client.post("/nodes/register", body).await?)?;
        }

        Commands::Submit { from, to, cost, uuid } => {
            let client = NodeClient::new(&cli.node)?;
            let mut body = json!({ "port_from": from, "port_to": to, "cost": cost });
            if let Some(uuid) = uuid {
                body["uuid"] = json!(uuid);
            }
            let answer = client.post("/contracts/new", body).await?;
            println!("{}", answer["message"].as_str().unwrap_or_default());
        }

        Commands::Confirm { id } => {
            let client = NodeClient::new(&cli.node)?;
            client.post(&format!("/contract/{}/export_oracle", id), json!({})).await?;
            println!("Contract {} confirmed", id);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_submit() {
        let cli = Cli::try_parse_from([
            "harbor", "--node", "http://10.0.0.2:5000", "submit", "--from", "A", "--to", "B", "--cost", "30",
        ])
        .unwrap();
        assert_eq!(cli.node, "http://10.0.0.2:5000");
        match cli.command {
            Commands::Submit { from, to, cost, uuid } => {
                assert_eq!((from.as_str(), to.as_str(), cost, uuid), ("A", "B", 30, None));
            }
            _ => panic!("expected submit"),
        }
    }

    #[test]
    fn test_node_defaults_to_harbor_toml() {
        let cli = Cli::try_parse_from(["harbor", "node"]).unwrap();
        match cli.command {
            Commands::Node { config, party_id, .. } => {
                assert_eq!(config, PathBuf::from("harbor.toml"));
                assert!(party_id.is_none());
            }
            _ => panic!("expected node"),
        }
    }
}
