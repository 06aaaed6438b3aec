//! Broker
//!
//! Orders, distributes and replays updates between simulated peers.
//!
//! ## Responsibilities
//!
//! - Registration: one handle per peer id, duplicates rejected
//! - Ordering: every update gets the next serial from the [`UpdateLog`]
//! - Live delivery: each send is pushed to every subscribed handle whose
//!   cursor is below the new serial, the sender included
//! - Replay: `connect` hands the peer everything past its skip count in a
//!   single batch
//! - Reset: `clear` wipes history and notifies each handle once per epoch
//!
//! ## Design
//!
//! - Action-based: methods return [`BrokerAction`]s, the driver performs the
//!   I/O (relaying batches to sockets, streaming audit entries)
//! - Audit entries are emitted as `Record` actions in the same order they are
//!   appended to the trail

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::{
    audit::AuditEntry,
    error::BrokerError,
    peer::{ClearNotice, PeerHandle, PeerId},
    update::{Update, UpdateLog},
};

/// Actions returned by the broker for the driver to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerAction {
    /// Hand a batch of updates to the peer's update listener.
    ///
    /// Live pushes carry exactly one update. Replay batches may be empty.
    Deliver {
        /// Receiving peer
        peer_id: PeerId,
        /// Updates in serial order
        updates: Vec<Update>,
    },

    /// Tell the peer its state was reset.
    NotifyClear {
        /// Peer to notify
        peer_id: PeerId,
    },

    /// An entry was appended to the audit trail.
    Record(AuditEntry),
}

/// Update distribution and replay broker.
#[derive(Debug, Default)]
pub struct Broker {
    log: UpdateLog,
    /// Handles in registration order (delivery order follows it)
    peers: Vec<PeerHandle>,
    index: HashMap<PeerId, usize>,
    /// Peers already notified of the current epoch's reset
    notified: HashSet<PeerId>,
    audit: Vec<AuditEntry>,
    epoch: u64,
}

impl Broker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle for `peer_id`.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::DuplicateRegistration` if the id is taken.
    pub fn create_handle(&mut self, peer_id: impl Into<PeerId>) -> Result<(), BrokerError> {
        let peer_id = peer_id.into();
        if self.index.contains_key(&peer_id) {
            return Err(BrokerError::DuplicateRegistration(peer_id));
        }

        tracing::debug!(peer = %peer_id, "handle registered");
        self.index.insert(peer_id.clone(), self.peers.len());
        self.peers.push(PeerHandle::new(peer_id));
        Ok(())
    }

    /// Whether a handle exists for `peer_id`.
    pub fn has_peer(&self, peer_id: &PeerId) -> bool {
        self.index.contains_key(peer_id)
    }

    /// Registered handle for `peer_id`.
    pub fn peer(&self, peer_id: &PeerId) -> Option<&PeerHandle> {
        self.index.get(peer_id).map(|&i| &self.peers[i])
    }

    /// Registered peer ids in registration order.
    pub fn peer_ids(&self) -> impl Iterator<Item = &PeerId> {
        self.peers.iter().map(PeerHandle::id)
    }

    /// Last serial handed out in the current epoch.
    pub fn current_serial(&self) -> u64 {
        self.log.current_serial()
    }

    /// Number of resets since construction.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The update log.
    pub fn log(&self) -> &UpdateLog {
        &self.log
    }

    /// Audit trail since the last reset.
    pub fn audit(&self) -> &[AuditEntry] {
        &self.audit
    }

    /// Append `payload` to the log on behalf of `peer_id` and push it to
    /// every handle that accepts it.
    ///
    /// Actions are, in order: the `sent` record, then a `received` record and
    /// a `Deliver` per accepting handle in registration order.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::UnknownPeer` if the sender is not registered.
    pub fn send_update(
        &mut self,
        peer_id: &PeerId,
        payload: Value,
        description: impl Into<String>,
    ) -> Result<Vec<BrokerAction>, BrokerError> {
        self.position(peer_id)?;

        let update = self.log.append(payload);
        tracing::debug!(peer = %peer_id, serial = update.serial, "update appended");

        let mut actions = vec![self.record(AuditEntry::Sent {
            peer_id: peer_id.clone(),
            update: update.clone(),
            description: description.into(),
        })];

        let recipients: Vec<PeerId> = self
            .peers
            .iter()
            .filter(|peer| peer.accepts(&update))
            .map(|peer| peer.id().clone())
            .collect();

        for recipient in recipients {
            actions.push(
                self.record(AuditEntry::Received { peer_id: recipient.clone(), update: update.clone() }),
            );
            actions.push(BrokerAction::Deliver { peer_id: recipient, updates: vec![update.clone()] });
        }

        Ok(actions)
    }

    /// Subscribe `peer_id` with `seen` updates already known and replay the
    /// rest.
    ///
    /// 1. Install the clear listener and run the clear path (a fresh connect
    ///    needs a fresh reset acknowledgment, once per epoch)
    /// 2. Install the update listener with `cursor = seen`
    /// 3. Replay everything past index `seen`, re-stamped with the current
    ///    log length, as exactly one `Deliver` (possibly empty)
    ///
    /// Calling this twice with the same `seen` replays the same range twice.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::UnknownPeer` if the peer is not registered.
    pub fn connect(
        &mut self,
        peer_id: &PeerId,
        seen: u64,
        clear_notice: ClearNotice,
    ) -> Result<Vec<BrokerAction>, BrokerError> {
        let position = self.position(peer_id)?;

        self.peers[position].install_clear_notice(clear_notice);
        let mut actions = self.notify_clear(position);

        self.peers[position].subscribe(seen);

        let updates = self.log.replay(seen);
        tracing::debug!(peer = %peer_id, seen, replayed = updates.len(), "peer connected");
        actions.push(BrokerAction::Deliver { peer_id: peer_id.clone(), updates });

        Ok(actions)
    }

    /// Remove the update listener for `peer_id`.
    ///
    /// The handle stays registered; live pushes to it are dropped until the
    /// next `connect`.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::UnknownPeer` if the peer is not registered.
    pub fn disconnect(&mut self, peer_id: &PeerId) -> Result<(), BrokerError> {
        let position = self.position(peer_id)?;
        self.peers[position].unsubscribe();
        tracing::debug!(peer = %peer_id, "peer disconnected");
        Ok(())
    }

    /// Reset to an empty log and start a new epoch.
    ///
    /// Wipes the log, the serial counter, the notified set and the audit
    /// trail, then runs every handle's clear path. Subscribed handles stay
    /// subscribed with their cursors rewound to zero.
    pub fn clear(&mut self) -> Vec<BrokerAction> {
        self.log.clear();
        self.notified.clear();
        self.audit.clear();
        self.epoch += 1;

        tracing::info!(epoch = self.epoch, peers = self.peers.len(), "broker reset");

        let mut actions = Vec::new();
        for position in 0..self.peers.len() {
            self.peers[position].rewind();
            actions.extend(self.notify_clear(position));
        }
        actions
    }

    /// Clear path for one handle, idempotent within an epoch.
    ///
    /// A handle that never installed a clear listener is skipped without
    /// being marked, so a later connect in the same epoch still notifies it.
    fn notify_clear(&mut self, position: usize) -> Vec<BrokerAction> {
        let peer = &self.peers[position];
        let Some(notice) = peer.clear_notice() else {
            return Vec::new();
        };
        if self.notified.contains(peer.id()) {
            return Vec::new();
        }

        let peer_id = peer.id().clone();
        self.notified.insert(peer_id.clone());

        let mut actions = vec![self.record(AuditEntry::Clear { peer_id: peer_id.clone() })];
        if notice == ClearNotice::Notify {
            actions.push(BrokerAction::NotifyClear { peer_id });
        }
        actions
    }

    fn record(&mut self, entry: AuditEntry) -> BrokerAction {
        self.audit.push(entry.clone());
        BrokerAction::Record(entry)
    }

    fn position(&self, peer_id: &PeerId) -> Result<usize, BrokerError> {
        self.index.get(peer_id).copied().ok_or_else(|| BrokerError::UnknownPeer(peer_id.clone()))
    }
}
