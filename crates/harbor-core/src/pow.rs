//! Proof-of-work engine
//!
//! Find `p` such that `sha256(last_proof ‖ p ‖ last_hash)` (decimal integers
//! and the hex hash concatenated as text) starts with [`DIFFICULTY`] zero hex
//! digits. The difficulty is a system constant and is never negotiated.

use crate::block::Block;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};

/// Required leading zero hex digits (16 bits)
pub const DIFFICULTY: u32 = 4;

/// Candidates tried between two looks at the cancel flag
const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Check a candidate proof against the previous proof and block hash
pub fn is_valid_proof(last_proof: u64, proof: u64, last_hash: &str) -> bool {
    let guess = format!("{}{}{}", last_proof, proof, last_hash);
    let digest = Sha256::digest(guess.as_bytes());
    leading_zero_nibbles(&digest) >= DIFFICULTY
}

/// Number of leading zero hex digits in a digest
pub fn leading_zero_nibbles(digest: &[u8]) -> u32 {
    let mut total = 0u32;
    for b in digest {
        if *b == 0 {
            total += 2;
        } else {
            if *b < 0x10 {
                total += 1;
            }
            break;
        }
    }
    total
}

/// First proof, counting up from zero, valid for the given predecessor.
///
/// Unbounded and CPU-bound; run it off any latency-sensitive path.
pub fn search(last_proof: u64, last_hash: &str) -> u64 {
    let mut proof = 0u64;
    while !is_valid_proof(last_proof, proof, last_hash) {
        proof += 1;
    }
    proof
}

/// As [`search`], but gives up with `None` once `cancel` is raised.
pub fn search_cancellable(last_proof: u64, last_hash: &str, cancel: &AtomicBool) -> Option<u64> {
    let mut proof = 0u64;
    loop {
        if proof % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            tracing::debug!("Proof search abandoned at candidate {}", proof);
            return None;
        }
        if is_valid_proof(last_proof, proof, last_hash) {
            return Some(proof);
        }
        proof += 1;
    }
}

/// Proof for the block following `last_block`
pub fn proof_of_work(last_block: &Block) -> u64 {
    search(last_block.proof, &last_block.hash())
}
