//! Harbor node runtime
//!
//! Wires the node context to its HTTP API and metrics listener and runs
//! until interrupted.

use crate::config::NodeConfig;
use crate::context::NodeContext;
use crate::metrics::MetricsServer;
use crate::rpc_server::RpcServer;

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::signal;

/// Node state
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Node is starting up
    Starting,
    /// Node is serving requests
    Running,
    /// Node is shutting down
    Stopping,
    /// Node has stopped
    Stopped,
}

pub struct HarborNode {
    ctx: Arc<NodeContext>,
    state: Arc<RwLock<NodeState>>,
}

impl HarborNode {
    /// Create a node talking to its peers over HTTP
    pub fn new(config: NodeConfig) -> anyhow::Result<Self> {
        Ok(Self::with_context(NodeContext::new(config)?))
    }

    pub fn with_context(ctx: NodeContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            state: Arc::new(RwLock::new(NodeState::Starting)),
        }
    }

    pub fn context(&self) -> &Arc<NodeContext> {
        &self.ctx
    }

    /// Get current state
    pub fn state(&self) -> NodeState {
        self.state.read().clone()
    }

    /// Run the node until Ctrl+C or SIGTERM
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!("Starting Harbor node...");
        *self.state.write() = NodeState::Starting;

        let config = self.ctx.config().clone();

        let rpc_handle = if config.rpc.enabled {
            let server = RpcServer::new(&config.rpc.address, self.ctx.clone());
            Some(tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    tracing::error!("HTTP API error: {}", e);
                }
            }))
        } else {
            None
        };

        let metrics_handle = if config.metrics.enabled {
            let server = MetricsServer::new(&config.metrics.address, self.ctx.metrics().clone());
            Some(tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    tracing::error!("Metrics server error: {}", e);
                }
            }))
        } else {
            None
        };

        *self.state.write() = NodeState::Running;
        self.print_startup_banner();

        self.wait_for_shutdown().await;

        *self.state.write() = NodeState::Stopping;
        tracing::info!("Shutting down...");

        self.ctx.miner().cancel();
        for handle in [rpc_handle, metrics_handle].into_iter().flatten() {
            handle.abort();
        }

        *self.state.write() = NodeState::Stopped;
        tracing::info!("Node stopped");
        Ok(())
    }

    fn print_startup_banner(&self) {
        let config = self.ctx.config();
        tracing::info!("Harbor node is running");

        match &config.node.party_id {
            Some(id) => tracing::info!("Port: {} ({}) at {}", id, config.node.name, config.node.address),
            None => tracing::warn!("No party_id configured; GET /port will answer 404"),
        }
        tracing::info!("Known parties: {}", self.ctx.parties().len());

        if config.rpc.enabled {
            tracing::info!("HTTP API: http://{}", config.rpc.address);
        }
        if config.metrics.enabled {
            tracing::info!("Metrics: http://{}/metrics", config.metrics.address);
        }
        tracing::info!("Press Ctrl+C to stop the node");
    }

    async fn wait_for_shutdown(&self) {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }
}
