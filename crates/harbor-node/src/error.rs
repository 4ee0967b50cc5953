//! Node-level errors

use harbor_core::error::{LedgerError, ValidationError};
use harbor_core::types::PartyId;
use thiserror::Error;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(Error, Debug)]
pub enum NodeError {
    /// Contract submission rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Request body could not be decoded
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Proof search abandoned because a longer chain was adopted
    #[error("Mining cancelled by chain replacement")]
    MiningCancelled,

    /// Proof found, but the tip it was mined on is gone
    #[error("Mined block superseded: chain tip changed during mining")]
    Superseded,

    /// Proof search worker died
    #[error("Mining worker failed: {0}")]
    Worker(String),

    /// This node has no registered party of its own
    #[error("Port not found: {0}")]
    PortNotFound(PartyId),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for NodeError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<prometheus::Error> for NodeError {
    fn from(e: prometheus::Error) -> Self {
        Self::Metrics(e.to_string())
    }
}

impl From<reqwest::Error> for NodeError {
    fn from(e: reqwest::Error) -> Self {
        Self::Client(e.to_string())
    }
}

impl NodeError {
    /// Get the error code for API responses
    pub fn code(&self) -> u32 {
        match self {
            Self::Validation(e) => LedgerError::from(e.clone()).code(),
            Self::MalformedRequest(_) => 1000,
            Self::MiningCancelled => 3001,
            Self::Superseded => 3002,
            Self::Worker(_) => 3003,
            Self::PortNotFound(_) => 4004,
            Self::Config(_) => 5001,
            Self::Metrics(_) => 5002,
            Self::Client(_) => 5003,
            Self::Io(_) => 5004,
        }
    }

    /// A retried mine may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MiningCancelled | Self::Superseded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_codes_pass_through() {
        let err: NodeError = ValidationError::IdenticalParties(PartyId::new("A")).into();
        assert_eq!(err.code(), 1003);
        assert_eq!(err.to_string(), "Ports matched: A");
    }

    #[test]
    fn test_mining_errors_are_recoverable() {
        assert!(NodeError::Superseded.is_recoverable());
        assert!(!NodeError::Config("bad".into()).is_recoverable());
    }
}
