//! Operations for model-based testing.
//!
//! Operations represent every broker input a peer or the dashboard can
//! produce. They are generated randomly by proptest and applied to both the
//! model and the real broker.

use arbitrary::Arbitrary;
use serde_json::Value;

/// Peer index (0-indexed); ids are derived with [`peer_name`].
pub type PeerIndex = u8;

/// Broker id for the peer at `index`.
pub fn peer_name(index: PeerIndex) -> String {
    format!("peer-{index}")
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Peer submits an update.
    Send {
        /// Sending peer.
        peer: PeerIndex,
        /// Payload seed (becomes a JSON number).
        seed: u8,
    },

    /// Peer installs its listeners having seen `seen` updates.
    Connect {
        /// Connecting peer.
        peer: PeerIndex,
        /// Skip count.
        seen: u8,
        /// Install a clear listener that is only recorded, never told.
        silent: bool,
    },

    /// Peer's last socket closes.
    Disconnect {
        /// Disconnecting peer.
        peer: PeerIndex,
    },

    /// Dashboard reset.
    Clear,
}

impl Operation {
    /// Payload an update with `seed` carries.
    pub fn payload(seed: u8) -> Value {
        Value::from(seed)
    }
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// Operation failed with expected error.
    Error(OperationError),
}

/// Expected errors that can occur during operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Peer index has no registered handle.
    UnknownPeer,

    /// Peer id registered twice.
    DuplicatePeer,
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}
