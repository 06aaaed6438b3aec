//! Peer endpoint wire protocol.
//!
//! JSON text frames over the `/webxdc` WebSocket. Inbound messages are
//! tagged by `type`; anything that does not match one of the three request
//! shapes is rejected before it can reach the broker.

use peersim_core::Update;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServerError;

/// Requests a connected client may send to its peer endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientRequest {
    /// Submit an update for distribution.
    SendUpdate {
        /// Opaque application payload
        update: Value,
        /// Human readable description
        #[serde(default)]
        descr: String,
    },

    /// Establish or replace the listen subscription.
    SetUpdateListener {
        /// Number of updates the client has already seen
        serial: u64,
    },

    /// Ask for the peer's static identity.
    RequestInfo,
}

/// Messages relayed from the endpoint to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// A batch of updates (live push or replay).
    Updates {
        /// Updates in serial order
        updates: Vec<Update>,
    },

    /// The simulator state was reset.
    Clear,

    /// Reply to [`ClientRequest::RequestInfo`].
    Info {
        /// Peer identity
        info: PeerInfo,
    },
}

/// Static identity of a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Application name
    pub name: String,
    /// Dashboard color
    pub color: String,
}

/// Parse one inbound text frame.
///
/// # Errors
///
/// Returns `ServerError::MalformedRequest` for invalid JSON, an unknown
/// `type`, or missing or mistyped fields.
pub fn parse_request(text: &str) -> Result<ClientRequest, ServerError> {
    serde_json::from_str(text).map_err(|e| ServerError::MalformedRequest(e.to_string()))
}
