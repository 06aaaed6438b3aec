//! Broker error types.

use thiserror::Error;

use crate::peer::PeerId;

/// Errors from broker operations.
///
/// Both variants indicate incorrect wiring by the caller (orchestrator or
/// endpoint), never a transient condition. Nothing here is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// A handle with this id is already registered.
    #[error("peer already registered: {0}")]
    DuplicateRegistration(PeerId),

    /// No handle with this id has been registered.
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),
}
