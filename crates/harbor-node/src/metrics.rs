//! Prometheus metrics

use crate::error::NodeError;
use axum::{extract::State, http::header, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;

/// Ledger metrics for one node
pub struct NodeMetrics {
    registry: Registry,
    pub chain_height: IntGauge,
    pub blocks_mined: IntCounter,
    pub chain_replacements: IntCounter,
    pub contracts_settled: IntCounter,
    pub peer_failures: IntCounter,
}

impl NodeMetrics {
    pub fn new() -> Result<Self, NodeError> {
        let registry = Registry::new();

        let chain_height = IntGauge::new("harbor_chain_height", "Blocks on the local chain")?;
        let blocks_mined = IntCounter::new("harbor_blocks_mined_total", "Blocks mined by this node")?;
        let chain_replacements =
            IntCounter::new("harbor_chain_replacements_total", "Local chain replaced by a peer chain")?;
        let contracts_settled = IntCounter::new("harbor_contracts_settled_total", "Contracts executed")?;
        let peer_failures =
            IntCounter::new("harbor_peer_failures_total", "Peers skipped during consensus resolution")?;

        registry.register(Box::new(chain_height.clone()))?;
        registry.register(Box::new(blocks_mined.clone()))?;
        registry.register(Box::new(chain_replacements.clone()))?;
        registry.register(Box::new(contracts_settled.clone()))?;
        registry.register(Box::new(peer_failures.clone()))?;

        chain_height.set(1);

        Ok(Self {
            registry,
            chain_height,
            blocks_mined,
            chain_replacements,
            contracts_settled,
            peer_failures,
        })
    }

    /// Prometheus text exposition
    pub fn render(&self) -> Result<String, NodeError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| NodeError::Metrics(e.to_string()))
    }
}

/// Standalone metrics listener
pub struct MetricsServer {
    address: String,
    metrics: Arc<NodeMetrics>,
}

impl MetricsServer {
    pub fn new(address: &str, metrics: Arc<NodeMetrics>) -> Self {
        Self {
            address: address.to_string(),
            metrics,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr: SocketAddr = self.address.parse()?;
        tracing::info!("Starting metrics server on {}", addr);

        let app = Router::new()
            .route("/metrics", get(serve_metrics))
            .with_state(self.metrics);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn serve_metrics(State(metrics): State<Arc<NodeMetrics>>) -> Result<impl IntoResponse, NodeError> {
    let body = metrics.render()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counters() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.blocks_mined.inc();
        metrics.chain_height.set(2);

        let text = metrics.render().unwrap();
        assert!(text.contains("harbor_blocks_mined_total 1"));
        assert!(text.contains("harbor_chain_height 2"));
    }
}
