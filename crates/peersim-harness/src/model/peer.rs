//! What a peer observes.

use serde_json::Value;

/// One update as seen by a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUpdate {
    /// Serial assigned by the broker.
    pub serial: u64,
    /// Log length when the update was handed out.
    pub max_serial: u64,
    /// Opaque payload.
    pub payload: Value,
}

/// Something a peer's listeners were handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A batch for the update listener.
    Batch(Vec<ModelUpdate>),
    /// A call of the clear listener.
    Clear,
}

/// Audit trail entry, reduced to what the model tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditRecord {
    /// Update submitted.
    Sent {
        /// Sender id.
        peer: String,
        /// Assigned serial.
        serial: u64,
    },
    /// Update pushed live.
    Received {
        /// Recipient id.
        peer: String,
        /// Serial pushed.
        serial: u64,
    },
    /// Clear path ran.
    Clear {
        /// Cleared peer id.
        peer: String,
    },
}

/// Model peer state.
#[derive(Debug, Clone, Default)]
pub(crate) struct ModelPeer {
    pub listening: bool,
    pub cursor: Option<u64>,
    /// `Some(true)` tells the peer, `Some(false)` only records
    pub clear_listener: Option<bool>,
    pub notified: bool,
    pub events: Vec<PeerEvent>,
}
