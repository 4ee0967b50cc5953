//! Node context
//!
//! Owns the node's ledger behind a single writer lock together with every
//! service that acts on it. Handlers receive an `Arc<NodeContext>`; nothing
//! here is process-global.

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::http_client::HttpPeers;
use crate::metrics::NodeMetrics;
use crate::miner::Miner;
use harbor_consensus::{ConsensusResolver, PeerSource, Resolution, ResolverConfig};
use harbor_contracts::{Oracle, OracleBook, SettlementConfig, SettlementEngine, SettlementReport};
use harbor_core::block::{Block, ChainSnapshot};
use harbor_core::contract::ContractSubmission;
use harbor_core::ledger::Ledger;
use harbor_core::party::{Party, PartyDescriptor, Registration};
use harbor_core::types::{ContractId, PartyId};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

pub struct NodeContext {
    config: NodeConfig,
    ledger: Arc<RwLock<Ledger>>,
    /// Confirmation marks this node serves as an oracle
    oracle_book: Arc<OracleBook>,
    resolver: ConsensusResolver,
    settlement: SettlementEngine,
    miner: Miner,
    metrics: Arc<NodeMetrics>,
}

impl NodeContext {
    /// Context talking to peers and oracles over HTTP
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let http = Arc::new(HttpPeers::new(config.request_timeout())?);
        Self::with_backends(config, http.clone(), http)
    }

    /// Context over explicit peer and oracle backends
    pub fn with_backends(
        config: NodeConfig,
        peers: Arc<dyn PeerSource>,
        oracle: Arc<dyn Oracle>,
    ) -> Result<Self, NodeError> {
        Self::build(config, peers, oracle, Arc::new(OracleBook::new()))
    }

    /// Context whose settlement consults this node's own oracle book
    pub fn with_local_oracle(config: NodeConfig, peers: Arc<dyn PeerSource>) -> Result<Self, NodeError> {
        let book = Arc::new(OracleBook::new());
        Self::build(config, peers, book.clone(), book)
    }

    /// Registers this node's own party (when configured) and every
    /// configured peer.
    fn build(
        config: NodeConfig,
        peers: Arc<dyn PeerSource>,
        oracle: Arc<dyn Oracle>,
        oracle_book: Arc<OracleBook>,
    ) -> Result<Self, NodeError> {
        let mut ledger = Ledger::new(config.node.initial_balance);
        for party in config.own_party().into_iter().chain(config.network.peers.iter().cloned()) {
            ledger.register_party(party);
        }

        let mut resolver = ConsensusResolver::new(
            peers,
            ResolverConfig {
                fetch_timeout: config.request_timeout(),
            },
        );
        if let Some(id) = &config.node.party_id {
            resolver = resolver.with_local_party(id.clone());
        }

        let settlement = SettlementEngine::new(
            oracle,
            SettlementConfig {
                query_timeout: config.request_timeout(),
            },
        );

        Ok(Self {
            config,
            ledger: Arc::new(RwLock::new(ledger)),
            oracle_book,
            resolver,
            settlement,
            miner: Miner::new(),
            metrics: Arc::new(NodeMetrics::new()?),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<RwLock<Ledger>> {
        &self.ledger
    }

    pub fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.metrics
    }

    pub fn oracle_book(&self) -> &Arc<OracleBook> {
        &self.oracle_book
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    /// Mine the pending pool into a new block, then settle what is confirmed.
    ///
    /// Returns the block as it stands after the settlement pass.
    pub async fn mine(&self) -> Result<Block, NodeError> {
        let mut block = self.miner.mine(&self.ledger).await?;
        self.metrics.blocks_mined.inc();
        self.metrics.chain_height.set(block.index as i64);

        if self.config.mining.settle_after_mine {
            self.settle_all().await;
            let ledger = self.ledger.read();
            if let Some(current) = ledger.chain().blocks().get(block.index as usize - 1) {
                block = current.clone();
            }
        }
        Ok(block)
    }

    /// Validate a submission and queue it; returns the index it should land in
    pub fn submit(&self, submission: ContractSubmission) -> Result<u64, NodeError> {
        let index = self.ledger.write().submit(submission)?;
        debug!("Contract queued for block {}", index);
        Ok(index)
    }

    pub fn chain(&self) -> ChainSnapshot {
        self.ledger.read().snapshot()
    }

    pub fn register_party(&self, descriptor: PartyDescriptor) -> Registration {
        let id = descriptor.id.clone();
        let registration = self.ledger.write().register_party(descriptor);
        if registration == Registration::Accepted {
            info!("Registered party {}", id);
        }
        registration
    }

    /// Register a batch of parties, skipping known ids; returns every known party
    pub fn register_parties(&self, descriptors: Vec<PartyDescriptor>) -> Vec<Party> {
        for descriptor in descriptors {
            self.register_party(descriptor);
        }
        self.parties()
    }

    pub fn parties(&self) -> Vec<Party> {
        self.ledger.read().parties().iter().cloned().collect()
    }

    /// Run consensus resolution, then a settlement pass.
    ///
    /// A replacement trips any in-flight mine so it does not keep searching
    /// on the abandoned tip.
    pub async fn resolve(&self) -> Resolution {
        let resolution = self.resolver.resolve(&self.ledger).await;

        self.metrics.peer_failures.inc_by(resolution.skipped() as u64);
        if resolution.replaced() {
            self.metrics.chain_replacements.inc();
            if self.miner.cancel() {
                info!("Cancelled in-flight mine after chain replacement");
            }
        }
        self.metrics.chain_height.set(resolution.length() as i64);

        self.settle_all().await;
        resolution
    }

    /// Settlement pass over the whole chain
    pub async fn settle_all(&self) -> SettlementReport {
        let report = self.settlement.execute_all(&self.ledger).await;
        self.metrics.contracts_settled.inc_by(report.settled.len() as u64);
        report
    }

    /// This node's own party record
    pub fn own_party(&self) -> Result<Party, NodeError> {
        let id = self
            .config
            .node
            .party_id
            .clone()
            .unwrap_or_else(|| PartyId::new(""));
        self.ledger
            .read()
            .party(&id)
            .cloned()
            .ok_or(NodeError::PortNotFound(id))
    }

    /// Record an oracle confirmation for a contract
    pub fn confirm(&self, contract: ContractId) -> bool {
        self.oracle_book.mark_confirmed(contract)
    }

    pub fn is_confirmed(&self, contract: &ContractId) -> bool {
        self.oracle_book.contains(contract)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_consensus::MemoryPeers;

    fn config() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.node.party_id = Some(PartyId::new("A"));
        config.node.name = "Alpha".into();
        config.network.peers = vec![PartyDescriptor {
            id: PartyId::new("B"),
            name: "Bravo".into(),
            address: "http://b".into(),
        }];
        config
    }

    fn context() -> NodeContext {
        NodeContext::with_local_oracle(config(), Arc::new(MemoryPeers::new())).unwrap()
    }

    #[test]
    fn test_boot_registers_own_and_configured_parties() {
        let ctx = context();
        let ids: Vec<_> = ctx.parties().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![PartyId::new("A"), PartyId::new("B")]);
        assert_eq!(ctx.own_party().unwrap().name, "Alpha");
    }

    #[test]
    fn test_own_party_missing_without_id() {
        let ctx = NodeContext::with_local_oracle(NodeConfig::default(), Arc::new(MemoryPeers::new())).unwrap();
        assert!(matches!(ctx.own_party(), Err(NodeError::PortNotFound(_))));
    }

    #[tokio::test]
    async fn test_mine_updates_metrics() {
        let ctx = context();
        ctx.submit(ContractSubmission::new("A", "B", 5)).unwrap();
        let block = ctx.mine().await.unwrap();

        assert_eq!(block.index, 2);
        assert_eq!(ctx.metrics().blocks_mined.get(), 1);
        assert_eq!(ctx.metrics().chain_height.get(), 2);
    }

    #[test]
    fn test_identical_parties_rejected_without_queueing() {
        let ctx = context();
        let err = ctx.submit(ContractSubmission::new("A", "A", 5)).unwrap_err();
        assert_eq!(err.code(), 1003);
        assert!(ctx.ledger().read().chain().pending().is_empty());
    }
}
