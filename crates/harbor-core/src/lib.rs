//! # Harbor Core
//!
//! Core data structures for the Harbor settlement ledger.
//!
//! This crate provides the fundamental building blocks:
//! - `Party` / `PartyRegistry` - account-like seaports holding a balance
//! - `Contract` - a pending or settled transfer between two parties
//! - `Block` / `Chain` - the hash-linked, proof-of-work secured block list
//! - `pow` - the proof-of-work search and predicate
//! - `validation` - whole-chain verification used by consensus
//!
//! ## Architecture
//!
//! ```text
//!   submit ──► pending pool ──► append_block(proof) ──► Chain
//!                                     ▲                   │
//!                          pow::search(last proof,        │
//!                                      hash(last block))  ▼
//!                                               validation::is_valid_chain
//! ```
//!
//! Everything here is synchronous and free of I/O; locking, networking and
//! the oracle live in the crates layered on top.

pub mod block;
pub mod canonical;
pub mod chain;
pub mod contract;
pub mod error;
pub mod ledger;
pub mod party;
pub mod pow;
pub mod types;
pub mod validation;

pub use block::*;
pub use chain::*;
pub use contract::*;
pub use error::*;
pub use ledger::*;
pub use party::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::block::{Block, ChainSnapshot};
    pub use crate::chain::Chain;
    pub use crate::contract::{Contract, ContractSubmission};
    pub use crate::error::{LedgerError, Result, SettlementError, ValidationError};
    pub use crate::ledger::Ledger;
    pub use crate::party::{Party, PartyRegistry, Registration};
    pub use crate::types::*;
}
