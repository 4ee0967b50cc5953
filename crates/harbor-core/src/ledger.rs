//! Node-owned ledger state: chain, pending pool and party registry
//!
//! The three mutate together (submission reads the registry, settlement
//! writes balances while flipping contract flags, chain replacement rebinds
//! contracts to registry entries), so a node keeps one `Ledger` behind a
//! single writer lock.

use crate::block::{Block, ChainSnapshot};
use crate::chain::Chain;
use crate::contract::{Contract, ContractSubmission};
use crate::error::{SettlementError, ValidationError};
use crate::party::{Party, PartyDescriptor, PartyRegistry, Registration};
use crate::types::{ContractId, PartyId};
use std::collections::BTreeSet;

/// Result of adopting a peer chain
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Adoption {
    /// Length of the adopted chain
    pub length: usize,
    /// Party ids named by adopted contracts but unknown locally
    pub unresolved: BTreeSet<PartyId>,
}

#[derive(Clone, Debug)]
pub struct Ledger {
    chain: Chain,
    parties: PartyRegistry,
    /// Bumped on every wholesale chain replacement
    epoch: u64,
}

impl Ledger {
    pub fn new(initial_balance: i64) -> Self {
        Self {
            chain: Chain::new(),
            parties: PartyRegistry::with_initial_balance(initial_balance),
            epoch: 0,
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn parties(&self) -> &PartyRegistry {
        &self.parties
    }

    pub fn party(&self, id: &PartyId) -> Option<&Party> {
        self.parties.get(id)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn register_party(&mut self, descriptor: PartyDescriptor) -> Registration {
        self.parties.register(descriptor)
    }

    /// Validate a boundary submission and queue the resulting contract
    pub fn submit(&mut self, submission: ContractSubmission) -> Result<u64, ValidationError> {
        let contract = submission.into_contract(&self.parties)?;
        self.submit_contract(contract)
    }

    pub fn submit_contract(&mut self, contract: Contract) -> Result<u64, ValidationError> {
        self.chain.submit_contract(contract, &self.parties)
    }

    pub fn append_block(&mut self, proof: u64, previous_hash: String) -> Block {
        self.chain.append_block(proof, previous_hash).clone()
    }

    /// Execute one mined contract given the oracle's answer
    pub fn settle(&mut self, id: &ContractId, confirmed: bool) -> Result<(), SettlementError> {
        let contract = self
            .chain
            .contract_mut(id)
            .ok_or_else(|| SettlementError::ContractNotFound(id.clone()))?;
        contract.execute(&mut self.parties, confirmed)
    }

    /// Replace the chain wholesale with an already validated one.
    ///
    /// Contracts are bound to local parties by id only; remote balances are
    /// never imported. Ids with no local party are reported so the caller can
    /// log them; such contracts stay on the chain and fail settlement with
    /// `SettlementError::UnknownParty` until the party is registered.
    pub fn replace_chain(&mut self, blocks: Vec<Block>) -> Adoption {
        let unresolved = blocks
            .iter()
            .flat_map(|b| b.transactions.iter())
            .flat_map(|c| [&c.source, &c.destination])
            .filter(|id| !self.parties.contains(id))
            .cloned()
            .collect();

        self.chain.replace_blocks(blocks);
        self.epoch += 1;

        Adoption {
            length: self.chain.len(),
            unresolved,
        }
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        self.chain.snapshot()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(crate::party::DEFAULT_INITIAL_BALANCE)
    }
}
