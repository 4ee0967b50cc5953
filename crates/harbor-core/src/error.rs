//! Error types for Harbor ledger operations

use crate::types::{ContractId, PartyId};
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Rejections of a contract submission.
///
/// Surfaced to the caller immediately and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required submission field was absent
    #[error("Missing values: {0}")]
    MissingField(&'static str),

    /// Submission names a party this node does not know
    #[error("No such port: {0}")]
    UnknownParty(PartyId),

    /// Source and destination are the same party
    #[error("Ports matched: {0}")]
    IdenticalParties(PartyId),

    /// Contract cost below zero
    #[error("Cost must be non-negative, got {0}")]
    NegativeCost(i64),

    /// Identifier already used by a pending or mined contract
    #[error("Duplicate contract: {0}")]
    DuplicateContract(ContractId),
}

/// Settlement conditions.
///
/// Internal to the settlement pass: logged and retried on the next pass,
/// never returned to a user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// Contract was already executed
    #[error("Contract already settled: {0}")]
    AlreadySettled(ContractId),

    /// Oracle has not confirmed the contract (or could not be reached)
    #[error("Contract not yet confirmed: {0}")]
    NotYetConfirmed(ContractId),

    /// Contract references a party missing from the local registry
    #[error("Contract references unknown party: {0}")]
    UnknownParty(PartyId),

    /// Transfer would push a balance outside the representable range
    #[error("Contract would overflow a balance: {0}")]
    BalanceOverflow(ContractId),

    /// No contract with this identifier on the chain
    #[error("Contract not found: {0}")]
    ContractNotFound(ContractId),
}

/// Errors that can occur in ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl LedgerError {
    /// Get the error code for API responses
    pub fn code(&self) -> u32 {
        match self {
            Self::Validation(ValidationError::MissingField(_)) => 1001,
            Self::Validation(ValidationError::UnknownParty(_)) => 1002,
            Self::Validation(ValidationError::IdenticalParties(_)) => 1003,
            Self::Validation(ValidationError::NegativeCost(_)) => 1004,
            Self::Validation(ValidationError::DuplicateContract(_)) => 1005,
            Self::Settlement(SettlementError::AlreadySettled(_)) => 2001,
            Self::Settlement(SettlementError::NotYetConfirmed(_)) => 2002,
            Self::Settlement(SettlementError::BalanceOverflow(_)) => 2003,
            Self::Settlement(_) => 2099,
            Self::Serialization(_) => 9999,
        }
    }

    /// Check if a later settlement pass may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Settlement(SettlementError::NotYetConfirmed(_))
                | Self::Settlement(SettlementError::UnknownParty(_))
        )
    }
}
