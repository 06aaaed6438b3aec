//! Audit trail entries.
//!
//! The broker appends one entry per send, per live delivery and per clear
//! notification. Dashboards read the trail to show traffic per peer; it is
//! wiped by a full reset.

use serde::{Deserialize, Serialize};

use crate::{peer::PeerId, update::Update};

/// One diagnostic record of broker traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuditEntry {
    /// A peer submitted an update.
    Sent {
        /// Sending peer.
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        /// The update as stored in the log.
        update: Update,
        /// Human readable description supplied by the sender.
        #[serde(rename = "descr")]
        description: String,
    },

    /// An update was pushed live to a peer.
    Received {
        /// Receiving peer.
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        /// The delivered update.
        update: Update,
    },

    /// A peer was notified of a reset.
    Clear {
        /// Notified peer.
        #[serde(rename = "peerId")]
        peer_id: PeerId,
    },
}

impl AuditEntry {
    /// Peer the entry belongs to.
    pub fn peer_id(&self) -> &PeerId {
        match self {
            Self::Sent { peer_id, .. } | Self::Received { peer_id, .. } | Self::Clear { peer_id } => {
                peer_id
            },
        }
    }

    /// Update carried by the entry, if any.
    pub fn update(&self) -> Option<&Update> {
        match self {
            Self::Sent { update, .. } | Self::Received { update, .. } => Some(update),
            Self::Clear { .. } => None,
        }
    }
}
