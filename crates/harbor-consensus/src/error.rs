//! Peer communication errors

use thiserror::Error;

/// Why a peer's chain could not be used.
///
/// Every variant means "skip this peer"; none is fatal to a resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeerError {
    /// Connection could not be established or was dropped
    #[error("Peer unreachable: {0}")]
    Unreachable(String),

    /// No answer within the fetch timeout
    #[error("Peer timed out after {0}ms")]
    Timeout(u64),

    /// Peer answered with a non-success status
    #[error("Peer answered with status {0}")]
    BadStatus(u16),

    /// Response body was not a chain
    #[error("Malformed chain response: {0}")]
    Malformed(String),
}

impl PeerError {
    /// Transport-level failures that may clear up on a later attempt
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_))
    }
}
