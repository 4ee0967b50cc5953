//! Blocks and block hashing
//!
//! The block digest commits **only** to the transaction list. Index,
//! timestamp, proof and previous hash are not hashed, so the digest does not
//! authenticate block metadata. Peer nodes compute the same digest and chains
//! are exchanged between them, so the input must stay exactly as it is.

use crate::canonical;
use crate::contract::Contract;
use crate::types::unix_seconds_f64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Previous-hash placeholder carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "1";

/// Proof carried by the genesis block
pub const GENESIS_PROOF: u64 = 100;

/// A batch of contracts sealed by a proof and linked to its predecessor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// 1-based position in the chain
    pub index: u64,
    /// Creation time, fractional Unix seconds
    pub timestamp: f64,
    /// Contracts in submission order
    pub transactions: Vec<Contract>,
    /// Winning proof-of-work value
    pub proof: u64,
    /// Hex digest of the previous block
    pub previous_hash: String,
}

impl Block {
    pub fn new(index: u64, transactions: Vec<Contract>, proof: u64, previous_hash: String) -> Self {
        Self {
            index,
            timestamp: unix_seconds_f64(),
            transactions,
            proof,
            previous_hash,
        }
    }

    /// The first block of every chain
    pub fn genesis() -> Self {
        Self::new(1, Vec::new(), GENESIS_PROOF, GENESIS_PREVIOUS_HASH.to_string())
    }

    /// Lowercase hex SHA-256 over the canonical transaction list
    pub fn hash(&self) -> String {
        hash_transactions(&self.transactions)
    }
}

/// Digest of a transaction list, as used for block linkage
pub fn hash_transactions(transactions: &[Contract]) -> String {
    let records = serde_json::Value::Array(transactions.iter().map(Contract::to_json).collect());
    sha256_hex(canonical::render(&records).as_bytes())
}

/// Lowercase hex SHA-256 digest
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Full chain as exchanged with peers: `{"chain": [...], "length": n}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub chain: Vec<Block>,
    pub length: usize,
}

impl ChainSnapshot {
    pub fn new(chain: Vec<Block>) -> Self {
        let length = chain.len();
        Self { chain, length }
    }

    /// Whether the declared length agrees with the blocks carried
    pub fn is_consistent(&self) -> bool {
        self.length == self.chain.len()
    }
}
