//! Whole-chain verification
//!
//! Pure and I/O free: consensus runs it on candidate chains fetched from
//! peers before adopting one.

use crate::block::Block;
use crate::pow;
use std::collections::HashSet;

/// Why a candidate chain was rejected
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainFault {
    /// No blocks at all
    Empty,
    /// `previous_hash` of the block at `index` does not match its predecessor
    BrokenLink { index: u64 },
    /// Proof of the block at `index` fails the predicate
    InvalidProof { index: u64 },
    /// Block at `index` repeats a contract id seen earlier on the chain
    DuplicateContract { index: u64 },
}

/// True when every link and proof checks out and there is a genesis block
pub fn is_valid_chain(chain: &[Block]) -> bool {
    verify_chain(chain).is_ok()
}

/// Walk the chain from the second block, reporting the first fault.
///
/// Contract ids must be unique across the whole chain, since settlement
/// addresses contracts by id.
pub fn verify_chain(chain: &[Block]) -> Result<(), ChainFault> {
    if chain.is_empty() {
        return Err(ChainFault::Empty);
    }

    let mut seen = HashSet::new();
    for block in chain {
        if !block.transactions.iter().all(|c| seen.insert(&c.id)) {
            return Err(ChainFault::DuplicateContract { index: block.index });
        }
    }

    for pair in chain.windows(2) {
        let (previous, block) = (&pair[0], &pair[1]);
        let previous_hash = previous.hash();

        if block.previous_hash != previous_hash {
            return Err(ChainFault::BrokenLink { index: block.index });
        }
        if !pow::is_valid_proof(previous.proof, block.proof, &previous_hash) {
            return Err(ChainFault::InvalidProof { index: block.index });
        }
    }
    Ok(())
}
