//! Server error types.

use peersim_core::BrokerError;
use thiserror::Error;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error
    #[error("transport error: {0}")]
    Transport(String),

    /// Inbound socket message matched no known request shape
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Broker rejected the operation
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
