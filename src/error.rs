//! Error types for cluster coordination.

use thiserror::Error;

/// Result type for cluster operations.
pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Errors that can occur while coordinating cluster state.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Invalid settings, or clustering used while disabled.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation that cannot be honoured in cluster mode.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// No seed member answered the join handshake.
    #[error("Failed to join cluster '{cluster}': {reason}")]
    Join { cluster: String, reason: String },

    /// The membership view has no alive member to route to.
    #[error("No alive members available")]
    NoMembers,

    /// A peer answered an internal request with a failure status.
    #[error("RPC to {endpoint} failed: {status}")]
    Rpc { endpoint: String, status: String },

    /// HTTP transport error talking to a peer.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Encoding or decoding error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for ClusterError {
    fn from(e: bincode::Error) -> Self {
        ClusterError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for ClusterError {
    fn from(e: serde_json::Error) -> Self {
        ClusterError::Serialization(e.to_string())
    }
}
