//! Block production
//!
//! The proof search is CPU-bound and unbounded, so it runs on a blocking
//! worker with the ledger unlocked. Mining happens in three steps:
//!
//! 1. `prepare` snapshots the tip (last proof, last hash, ledger epoch)
//! 2. the search runs with a cancellation flag the resolver can trip
//! 3. `commit` appends the block only if the tip is still the one mined on
//!
//! At most one mine runs at a time per node.

use crate::error::NodeError;
use harbor_core::block::Block;
use harbor_core::ledger::Ledger;
use harbor_core::pow;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Tip a proof is searched against
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MiningJob {
    pub last_proof: u64,
    pub last_hash: String,
    /// Ledger epoch at snapshot time; bumped by chain replacement
    pub epoch: u64,
}

#[derive(Default)]
pub struct Miner {
    /// Serializes mines
    running: tokio::sync::Mutex<()>,
    /// Cancellation flag of the in-flight search
    cancel: Mutex<Option<Arc<AtomicBool>>>,
}

impl Miner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current tip
    pub fn prepare(ledger: &RwLock<Ledger>) -> MiningJob {
        let ledger = ledger.read();
        let last = ledger.chain().last_block();
        MiningJob {
            last_proof: last.proof,
            last_hash: last.hash(),
            epoch: ledger.epoch(),
        }
    }

    /// Append a block for `proof` if `job` still describes the tip
    pub fn commit(ledger: &RwLock<Ledger>, job: &MiningJob, proof: u64) -> Result<Block, NodeError> {
        let mut ledger = ledger.write();
        if ledger.epoch() != job.epoch || ledger.chain().last_block().hash() != job.last_hash {
            return Err(NodeError::Superseded);
        }
        Ok(ledger.append_block(proof, job.last_hash.clone()))
    }

    /// Mine one block on the current tip
    pub async fn mine(&self, ledger: &RwLock<Ledger>) -> Result<Block, NodeError> {
        let _running = self.running.lock().await;

        let job = Self::prepare(ledger);
        let flag = Arc::new(AtomicBool::new(false));
        *self.cancel.lock() = Some(flag.clone());
        let _search = SearchGuard {
            slot: &self.cancel,
            flag: flag.clone(),
        };

        debug!("Mining on proof {} / hash {}", job.last_proof, job.last_hash);
        let start = Instant::now();

        let (last_proof, last_hash) = (job.last_proof, job.last_hash.clone());
        let searched =
            tokio::task::spawn_blocking(move || pow::search_cancellable(last_proof, &last_hash, &flag)).await;

        let proof = match searched {
            Ok(Some(proof)) => proof,
            Ok(None) => {
                info!("Mining cancelled after {:.2}s", start.elapsed().as_secs_f64());
                return Err(NodeError::MiningCancelled);
            }
            Err(e) => return Err(NodeError::Worker(e.to_string())),
        };

        let block = Self::commit(ledger, &job, proof)?;
        info!(
            "Block #{} forged with {} contract(s), proof {} ({:.2}ms)",
            block.index,
            block.transactions.len(),
            block.proof,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(block)
    }

    /// Trip the in-flight search, if any; true when one was running
    pub fn cancel(&self) -> bool {
        match self.cancel.lock().as_ref() {
            Some(flag) => {
                flag.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn is_mining(&self) -> bool {
        self.cancel.lock().is_some()
    }
}

/// Clears the published flag when a mine ends, including when its future is
/// dropped mid-search, and stops a search nobody is waiting on
struct SearchGuard<'a> {
    slot: &'a Mutex<Option<Arc<AtomicBool>>>,
    flag: Arc<AtomicBool>,
}

impl Drop for SearchGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(true, Ordering::Relaxed);
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|f| Arc::ptr_eq(f, &self.flag)) {
            *slot = None;
        }
    }
}
