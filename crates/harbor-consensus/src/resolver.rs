//! Consensus resolver: adopt the longest valid peer chain

use crate::error::PeerError;
use crate::peer::PeerSource;
use futures::future::join_all;
use harbor_core::block::{Block, ChainSnapshot};
use harbor_core::ledger::Ledger;
use harbor_core::party::Party;
use harbor_core::types::PartyId;
use harbor_core::validation;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Resolver configuration
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// Upper bound on a single peer chain fetch
    pub fetch_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

/// Outcome of one resolution round
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Local chain was replaced by a peer's
    Replaced {
        source: PartyId,
        length: usize,
        /// Party ids on the adopted chain with no local registration
        unresolved: BTreeSet<PartyId>,
        /// Peers that could not be used this round
        skipped: usize,
    },
    /// Local chain is authoritative
    Kept { length: usize, skipped: usize },
}

impl Resolution {
    pub fn replaced(&self) -> bool {
        matches!(self, Self::Replaced { .. })
    }

    pub fn length(&self) -> usize {
        match self {
            Self::Replaced { length, .. } | Self::Kept { length, .. } => *length,
        }
    }

    pub fn skipped(&self) -> usize {
        match self {
            Self::Replaced { skipped, .. } | Self::Kept { skipped, .. } => *skipped,
        }
    }
}

/// Longest-valid-chain resolver.
///
/// Ties never replace: a peer chain must be strictly longer than the local
/// one (and than every earlier candidate) to win.
pub struct ConsensusResolver {
    source: Arc<dyn PeerSource>,
    config: ResolverConfig,
    /// This node's own party, never queried as a peer
    local_party: Option<PartyId>,
}

impl ConsensusResolver {
    pub fn new(source: Arc<dyn PeerSource>, config: ResolverConfig) -> Self {
        Self {
            source,
            config,
            local_party: None,
        }
    }

    pub fn with_local_party(mut self, party: PartyId) -> Self {
        self.local_party = Some(party);
        self
    }

    /// Run one resolution round against every registered peer.
    ///
    /// The ledger lock is not held while peers are contacted. The
    /// replacement re-checks the local length under the write lock, so a
    /// block mined meanwhile is never overwritten by a chain that is no
    /// longer longer.
    pub async fn resolve(&self, ledger: &RwLock<Ledger>) -> Resolution {
        let (local_length, peers) = {
            let ledger = ledger.read();
            let peers: Vec<Party> = ledger
                .parties()
                .iter()
                .filter(|p| self.local_party.as_ref() != Some(&p.id))
                .cloned()
                .collect();
            (ledger.chain().len(), peers)
        };

        debug!("Resolving against {} peer(s), local length {}", peers.len(), local_length);

        let results = join_all(peers.iter().map(|peer| self.fetch(peer))).await;

        let mut max_length = local_length;
        let mut winner: Option<(PartyId, Vec<Block>)> = None;
        let mut skipped = 0usize;

        for (peer, result) in peers.iter().zip(results) {
            let snapshot = match result {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Skipping peer {}: {}", peer.id, e);
                    skipped += 1;
                    continue;
                }
            };

            if !snapshot.is_consistent() {
                warn!(
                    "Skipping peer {}: declared length {} but sent {} block(s)",
                    peer.id,
                    snapshot.length,
                    snapshot.chain.len()
                );
                skipped += 1;
                continue;
            }
            if snapshot.length <= max_length {
                continue;
            }

            match validation::verify_chain(&snapshot.chain) {
                Ok(()) => {
                    max_length = snapshot.length;
                    winner = Some((peer.id.clone(), snapshot.chain));
                }
                Err(fault) => {
                    warn!("Rejecting chain from {}: {:?}", peer.id, fault);
                }
            }
        }

        let Some((source, blocks)) = winner else {
            return Resolution::Kept {
                length: local_length,
                skipped,
            };
        };

        let mut ledger = ledger.write();
        let current = ledger.chain().len();
        if blocks.len() <= current {
            info!(
                "Local chain grew to {} during resolution; keeping it over {} from {}",
                current,
                blocks.len(),
                source
            );
            return Resolution::Kept {
                length: current,
                skipped,
            };
        }

        let adoption = ledger.replace_chain(blocks);
        info!("Chain replaced by {} (length {} -> {})", source, current, adoption.length);
        for party in &adoption.unresolved {
            warn!("Adopted chain references unregistered party {}", party);
        }

        Resolution::Replaced {
            source,
            length: adoption.length,
            unresolved: adoption.unresolved,
            skipped,
        }
    }

    async fn fetch(&self, peer: &Party) -> Result<ChainSnapshot, PeerError> {
        let timeout = self.config.fetch_timeout;
        match tokio::time::timeout(timeout, self.source.fetch_chain(peer)).await {
            Ok(result) => result,
            Err(_) => Err(PeerError::Timeout(timeout.as_millis() as u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::MemoryPeers;
    use async_trait::async_trait;
    use harbor_core::contract::ContractSubmission;
    use harbor_core::party::PartyDescriptor;
    use harbor_core::pow;

    fn ledger() -> Ledger {
        let mut ledger = Ledger::default();
        for id in ["A", "B", "C"] {
            ledger.register_party(PartyDescriptor {
                id: PartyId::new(id),
                name: id.to_string(),
                address: format!("http://{}", id.to_lowercase()),
            });
        }
        ledger
    }

    /// Ledger whose chain has `length` blocks, genesis included
    fn ledger_of_length(length: usize) -> Ledger {
        let mut ledger = ledger();
        while ledger.chain().len() < length {
            ledger
                .submit(ContractSubmission::new("A", "B", ledger.chain().len() as i64))
                .unwrap();
            let last = ledger.chain().last_block();
            let proof = pow::proof_of_work(last);
            let previous_hash = last.hash();
            ledger.append_block(proof, previous_hash);
        }
        ledger
    }

    fn resolver(peers: Arc<MemoryPeers>) -> ConsensusResolver {
        ConsensusResolver::new(peers, ResolverConfig::default()).with_local_party(PartyId::new("A"))
    }

    #[tokio::test]
    async fn test_longer_valid_chain_is_adopted() {
        let local = RwLock::new(ledger_of_length(3));
        let remote = ledger_of_length(5);
        let peers = Arc::new(MemoryPeers::new());
        peers.set_chain("B", remote.snapshot());

        let resolution = resolver(peers).resolve(&local).await;

        assert!(resolution.replaced());
        assert_eq!(resolution.length(), 5);
        assert_eq!(local.read().chain().blocks(), remote.chain().blocks());
        assert_eq!(local.read().epoch(), 1);
    }

    #[tokio::test]
    async fn test_equal_length_chain_is_kept() {
        let local = RwLock::new(ledger_of_length(3));
        let before = local.read().snapshot();
        let peers = Arc::new(MemoryPeers::new());
        peers.set_chain("B", ledger_of_length(3).snapshot());

        let resolution = resolver(peers).resolve(&local).await;

        assert_eq!(resolution, Resolution::Kept { length: 3, skipped: 1 });
        assert_eq!(local.read().snapshot(), before);
    }

    #[tokio::test]
    async fn test_invalid_longer_chain_is_rejected() {
        let local = RwLock::new(ledger_of_length(2));
        let mut forged = ledger_of_length(4).snapshot();
        forged.chain[2].previous_hash = "0".repeat(64);
        let peers = Arc::new(MemoryPeers::new());
        peers.set_chain("B", forged);

        let resolution = resolver(peers).resolve(&local).await;
        assert!(!resolution.replaced());
        assert_eq!(local.read().chain().len(), 2);
    }

    #[tokio::test]
    async fn test_chain_repeating_a_contract_is_rejected() {
        let local = RwLock::new(ledger_of_length(2));
        let mut blocks = ledger_of_length(2).snapshot().chain;
        let repeated = blocks[1].transactions[0].clone();
        let proof = pow::proof_of_work(&blocks[1]);
        let previous_hash = blocks[1].hash();
        blocks.push(Block::new(3, vec![repeated], proof, previous_hash));

        let peers = Arc::new(MemoryPeers::new());
        peers.set_chain("B", ChainSnapshot::new(blocks));

        let resolution = resolver(peers).resolve(&local).await;
        assert!(!resolution.replaced());
        assert_eq!(local.read().chain().len(), 2);
    }

    #[tokio::test]
    async fn test_longest_of_several_peers_wins() {
        let local = RwLock::new(ledger_of_length(1));
        let longest = ledger_of_length(4);
        let peers = Arc::new(MemoryPeers::new());
        peers.set_chain("B", ledger_of_length(3).snapshot());
        peers.set_chain("C", longest.snapshot());

        let resolution = resolver(peers).resolve(&local).await;

        match resolution {
            Resolution::Replaced { source, length, .. } => {
                assert_eq!(source, PartyId::new("C"));
                assert_eq!(length, 4);
            }
            other => panic!("expected replacement, got {:?}", other),
        }
        assert_eq!(local.read().chain().blocks(), longest.chain().blocks());
    }

    #[tokio::test]
    async fn test_failing_peer_is_skipped() {
        let local = RwLock::new(ledger_of_length(1));
        let peers = Arc::new(MemoryPeers::new());
        peers.set_failure("B", PeerError::BadStatus(500));
        peers.set_chain("C", ledger_of_length(2).snapshot());

        let resolution = resolver(peers).resolve(&local).await;
        assert!(resolution.replaced());
        assert_eq!(resolution.skipped(), 1);
    }

    #[tokio::test]
    async fn test_inconsistent_declared_length_is_skipped() {
        let local = RwLock::new(ledger_of_length(1));
        let mut lying = ledger_of_length(2).snapshot();
        lying.length = 10;
        let peers = Arc::new(MemoryPeers::new());
        peers.set_chain("B", lying);

        let resolution = resolver(peers).resolve(&local).await;
        assert!(!resolution.replaced());
        assert_eq!(local.read().chain().len(), 1);
    }

    #[tokio::test]
    async fn test_local_party_is_not_queried() {
        let local = RwLock::new(ledger_of_length(1));
        let peers = Arc::new(MemoryPeers::new());
        peers.set_chain("A", ledger_of_length(2).snapshot());

        let resolution = resolver(peers).resolve(&local).await;
        assert_eq!(resolution, Resolution::Kept { length: 1, skipped: 2 });
    }

    struct HangingPeers;

    #[async_trait]
    impl PeerSource for HangingPeers {
        async fn fetch_chain(&self, _peer: &Party) -> Result<ChainSnapshot, PeerError> {
            futures::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_peer_times_out() {
        let local = RwLock::new(ledger());
        let config = ResolverConfig {
            fetch_timeout: Duration::from_millis(250),
        };
        let resolver = ConsensusResolver::new(Arc::new(HangingPeers), config);

        let resolution = resolver.resolve(&local).await;
        assert_eq!(resolution, Resolution::Kept { length: 1, skipped: 3 });
    }
}
