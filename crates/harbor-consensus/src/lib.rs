//! # Harbor Consensus
//!
//! Longest-valid-chain adoption between ledger copies.
//!
//! ## Resolution
//!
//! 1. Note the local chain length
//! 2. Fetch every known peer's full chain (concurrently, each under a timeout)
//! 3. Keep the longest candidate that is strictly longer and passes validation
//! 4. Replace the local chain with it, rebinding contracts to local parties
//!
//! Peers that cannot be reached are skipped; resolution itself never fails.

pub mod error;
pub mod peer;
pub mod resolver;

pub use error::*;
pub use peer::*;
pub use resolver::*;
