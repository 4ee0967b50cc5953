//! Chain store: the ordered block list plus the pending pool

use crate::block::{Block, ChainSnapshot};
use crate::contract::{check_contract, Contract};
use crate::error::ValidationError;
use crate::party::PartyRegistry;
use crate::types::ContractId;

/// Ordered blocks (index 0 is genesis) and contracts awaiting the next block
#[derive(Clone, Debug)]
pub struct Chain {
    blocks: Vec<Block>,
    pending: Vec<Contract>,
}

impl Chain {
    /// Fresh chain holding only the genesis block
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
            pending: Vec::new(),
        }
    }

    /// Seal the pending pool into a new block and append it.
    ///
    /// The pool is emptied; contracts keep their submission order.
    pub fn append_block(&mut self, proof: u64, previous_hash: String) -> &Block {
        let index = self.next_index();
        let transactions = std::mem::take(&mut self.pending);
        let block = Block::new(index, transactions, proof, previous_hash);

        tracing::debug!(
            "Appending block #{} with {} transaction(s)",
            block.index,
            block.transactions.len()
        );
        self.blocks.push(block);
        self.last_block()
    }

    /// Validate a contract and queue it for the next block.
    ///
    /// Returns the index of the block the contract is expected to land in.
    /// The pool is left untouched when validation fails.
    pub fn submit_contract(
        &mut self,
        contract: Contract,
        parties: &PartyRegistry,
    ) -> Result<u64, ValidationError> {
        check_contract(&contract, parties)?;
        if self.contains_contract(&contract.id) {
            return Err(ValidationError::DuplicateContract(contract.id));
        }
        self.push_pending(contract);
        Ok(self.next_index())
    }

    pub(crate) fn push_pending(&mut self, contract: Contract) {
        self.pending.push(contract);
    }

    /// Most recently appended block
    pub fn last_block(&self) -> &Block {
        // A chain is never constructed without its genesis block.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Index the next mined block will carry
    pub fn next_index(&self) -> u64 {
        self.last_block().index + 1
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn pending(&self) -> &[Contract] {
        &self.pending
    }

    /// Every mined contract, oldest block first
    pub fn contracts(&self) -> impl Iterator<Item = &Contract> {
        self.blocks.iter().flat_map(|b| b.transactions.iter())
    }

    pub fn contract(&self, id: &ContractId) -> Option<&Contract> {
        self.contracts().find(|c| &c.id == id)
    }

    pub fn contract_mut(&mut self, id: &ContractId) -> Option<&mut Contract> {
        self.blocks
            .iter_mut()
            .flat_map(|b| b.transactions.iter_mut())
            .find(|c| &c.id == id)
    }

    /// Known either as mined or pending
    pub fn contains_contract(&self, id: &ContractId) -> bool {
        self.contract(id).is_some() || self.pending.iter().any(|c| &c.id == id)
    }

    /// Swap in a different block list wholesale.
    ///
    /// Pending contracts the new blocks already carry are dropped from the pool.
    /// Callers validate `blocks` first; an empty list is ignored.
    pub fn replace_blocks(&mut self, blocks: Vec<Block>) {
        if blocks.is_empty() {
            tracing::warn!("Refusing to replace chain with an empty block list");
            return;
        }
        self.blocks = blocks;

        let before = self.pending.len();
        let blocks = &self.blocks;
        self.pending.retain(|p| {
            !blocks
                .iter()
                .flat_map(|b| b.transactions.iter())
                .any(|c| c.id == p.id)
        });
        if self.pending.len() != before {
            tracing::debug!(
                "Dropped {} pending contract(s) already mined on the adopted chain",
                before - self.pending.len()
            );
        }
    }

    /// Copy of the full chain for transfer to peers
    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot::new(self.blocks.clone())
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}
