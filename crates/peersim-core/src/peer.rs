//! Per-peer registration records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::update::Update;

/// Identity of a simulated peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Create a peer id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Whether a connecting peer wants reset notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearNotice {
    /// Emit [`BrokerAction::NotifyClear`](crate::BrokerAction::NotifyClear)
    /// on reset.
    #[default]
    Notify,
    /// Record the reset in the audit trail only.
    Silent,
}

/// Registration record for one simulated peer.
///
/// A handle starts out unsubscribed with no cursor. It only becomes a
/// delivery target after the first `connect`.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: PeerId,
    subscribed: bool,
    cursor: Option<u64>,
    clear_notice: Option<ClearNotice>,
}

impl PeerHandle {
    pub(crate) fn new(id: PeerId) -> Self {
        Self { id, subscribed: false, cursor: None, clear_notice: None }
    }

    /// Peer identity.
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Whether an update listener is installed.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Count of updates the peer declared as seen on its last connect.
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// Installed clear listener, if any.
    pub fn clear_notice(&self) -> Option<ClearNotice> {
        self.clear_notice
    }

    /// Whether a live push of `update` reaches this peer.
    ///
    /// The cursor is fixed at connect time; delivery never advances it.
    pub fn accepts(&self, update: &Update) -> bool {
        self.subscribed && self.cursor.is_some_and(|cursor| update.serial > cursor)
    }

    pub(crate) fn install_clear_notice(&mut self, notice: ClearNotice) {
        self.clear_notice = Some(notice);
    }

    pub(crate) fn subscribe(&mut self, cursor: u64) {
        self.subscribed = true;
        self.cursor = Some(cursor);
    }

    pub(crate) fn unsubscribe(&mut self) {
        self.subscribed = false;
    }

    /// Rewind the cursor after a reset so the new epoch's serials are not
    /// filtered out by a watermark from the previous one.
    pub(crate) fn rewind(&mut self) {
        if self.cursor.is_some() {
            self.cursor = Some(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn update(serial: u64) -> Update {
        Update { serial, max_serial: serial, payload: Value::Null }
    }

    #[test]
    fn fresh_handle_accepts_nothing() {
        let handle = PeerHandle::new(PeerId::from("7001"));

        assert!(!handle.accepts(&update(1)));
        assert_eq!(handle.cursor(), None);
    }

    #[test]
    fn accepts_only_beyond_cursor() {
        let mut handle = PeerHandle::new(PeerId::from("7001"));
        handle.subscribe(3);

        assert!(!handle.accepts(&update(2)));
        assert!(!handle.accepts(&update(3)));
        assert!(handle.accepts(&update(4)));
    }

    #[test]
    fn unsubscribed_handle_keeps_cursor_but_drops_pushes() {
        let mut handle = PeerHandle::new(PeerId::from("7001"));
        handle.subscribe(0);
        handle.unsubscribe();

        assert!(!handle.accepts(&update(1)));
        assert_eq!(handle.cursor(), Some(0));
    }

    #[test]
    fn rewind_leaves_unconnected_handle_alone() {
        let mut handle = PeerHandle::new(PeerId::from("7001"));
        handle.rewind();
        assert_eq!(handle.cursor(), None);

        handle.subscribe(9);
        handle.rewind();
        assert_eq!(handle.cursor(), Some(0));
    }

    #[test]
    fn peer_id_serializes_as_plain_string() {
        let id = PeerId::from("7002");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"7002\"");
    }
}
