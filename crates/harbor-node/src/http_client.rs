//! HTTP access to peer nodes: chain fetches and oracle queries

use crate::error::NodeError;
use async_trait::async_trait;
use harbor_consensus::{PeerError, PeerSource};
use harbor_contracts::{Oracle, OracleError};
use harbor_core::block::ChainSnapshot;
use harbor_core::party::Party;
use harbor_core::types::ContractId;
use reqwest::StatusCode;
use std::time::Duration;

/// reqwest-backed peer client
#[derive(Clone)]
pub struct HttpPeers {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPeers {
    pub fn new(timeout: Duration) -> Result<Self, NodeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("harbor-node/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, timeout })
    }

    fn transport_error(&self, address: &str, e: reqwest::Error) -> PeerError {
        if e.is_timeout() {
            PeerError::Timeout(self.timeout.as_millis() as u64)
        } else if e.is_decode() {
            PeerError::Malformed(e.to_string())
        } else {
            PeerError::Unreachable(format!("{}: {}", address, e))
        }
    }
}

/// Join a party's base address and a path
pub fn endpoint(address: &str, path: &str) -> String {
    format!("{}{}", address.trim_end_matches('/'), path)
}

#[async_trait]
impl PeerSource for HttpPeers {
    async fn fetch_chain(&self, peer: &Party) -> Result<ChainSnapshot, PeerError> {
        let url = endpoint(&peer.address, "/chain");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(&peer.address, e))?;

        if response.status() != StatusCode::OK {
            return Err(PeerError::BadStatus(response.status().as_u16()));
        }

        response
            .json::<ChainSnapshot>()
            .await
            .map_err(|e| PeerError::Malformed(e.to_string()))
    }
}

/// The oracle for a contract lives at its destination party's node:
/// 200 means confirmed, anything else means not (yet) confirmed.
#[async_trait]
impl Oracle for HttpPeers {
    async fn is_confirmed(&self, contract: &ContractId, destination: &Party) -> Result<bool, OracleError> {
        let url = endpoint(&destination.address, &format!("/contract/{}/is_done", contract));
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout(self.timeout.as_millis() as u64)
            } else {
                OracleError::Unreachable(format!("{}: {}", destination.address, e))
            }
        })?;

        Ok(response.status() == StatusCode::OK)
    }
}
