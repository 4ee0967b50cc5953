//! Peer chain sources

use crate::error::PeerError;
use async_trait::async_trait;
use harbor_core::block::ChainSnapshot;
use harbor_core::party::Party;
use harbor_core::types::PartyId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Where the resolver gets peer chains from.
///
/// The node implements this over HTTP; tests use [`MemoryPeers`].
#[async_trait]
pub trait PeerSource: Send + Sync {
    /// Fetch the full chain a peer currently holds
    async fn fetch_chain(&self, peer: &Party) -> Result<ChainSnapshot, PeerError>;
}

/// In-memory peer chains keyed by party id
#[derive(Default)]
pub struct MemoryPeers {
    chains: RwLock<HashMap<PartyId, Result<ChainSnapshot, PeerError>>>,
}

impl MemoryPeers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `snapshot` for `peer`
    pub fn set_chain(&self, peer: impl Into<PartyId>, snapshot: ChainSnapshot) {
        self.chains.write().insert(peer.into(), Ok(snapshot));
    }

    /// Answer fetches for `peer` with `error`
    pub fn set_failure(&self, peer: impl Into<PartyId>, error: PeerError) {
        self.chains.write().insert(peer.into(), Err(error));
    }
}

#[async_trait]
impl PeerSource for MemoryPeers {
    async fn fetch_chain(&self, peer: &Party) -> Result<ChainSnapshot, PeerError> {
        self.chains
            .read()
            .get(&peer.id)
            .cloned()
            .unwrap_or_else(|| Err(PeerError::Unreachable(peer.address.clone())))
    }
}
