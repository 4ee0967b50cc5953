//! Oracle confirmation signal

use async_trait::async_trait;
use harbor_core::party::Party;
use harbor_core::types::ContractId;
use parking_lot::RwLock;
use std::collections::HashSet;
use thiserror::Error;

/// Oracle query failures; the settlement engine reads all of them as "not confirmed"
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Oracle unreachable: {0}")]
    Unreachable(String),

    #[error("Oracle timed out after {0}ms")]
    Timeout(u64),
}

/// Source of contract confirmations
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Ask whether `contract` is fulfilled, at the oracle hosted by `destination`
    async fn is_confirmed(&self, contract: &ContractId, destination: &Party) -> Result<bool, OracleError>;
}

/// Confirmation marks held by this node.
///
/// A node serves the marks for contracts whose destination it is; the
/// oracle actor records them with [`OracleBook::mark_confirmed`].
#[derive(Default)]
pub struct OracleBook {
    confirmed: RwLock<HashSet<ContractId>>,
}

impl OracleBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a confirmation; false when it was already recorded
    pub fn mark_confirmed(&self, contract: ContractId) -> bool {
        let inserted = self.confirmed.write().insert(contract.clone());
        if inserted {
            tracing::info!("Oracle confirmed contract {}", contract);
        }
        inserted
    }

    pub fn contains(&self, contract: &ContractId) -> bool {
        self.confirmed.read().contains(contract)
    }

    pub fn len(&self) -> usize {
        self.confirmed.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.confirmed.read().is_empty()
    }
}

/// Answers from the local book regardless of which party hosts the oracle
#[async_trait]
impl Oracle for OracleBook {
    async fn is_confirmed(&self, contract: &ContractId, _destination: &Party) -> Result<bool, OracleError> {
        Ok(self.contains(contract))
    }
}
