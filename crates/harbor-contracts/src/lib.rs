//! # Harbor Contracts
//!
//! Settlement of mined contracts against an external oracle.
//!
//! A contract is executed once its destination party's oracle confirms it.
//! Execution moves the cost between the two parties' balances and marks the
//! contract settled; unconfirmed contracts stay pending and are retried on
//! the next settlement pass (after every mined block and every consensus
//! round).

pub mod oracle;
pub mod settlement;

pub use oracle::*;
pub use settlement::*;
