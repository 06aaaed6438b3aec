//! Model world - the reference broker.
//!
//! Every rule is written out longhand so it can be checked by reading it.

use serde_json::Value;

use super::{
    operation::{Operation, OperationError, OperationResult, PeerIndex, peer_name},
    peer::{AuditRecord, ModelPeer, ModelUpdate, PeerEvent},
};

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Serial of the newest update in the current epoch.
    pub serial: u64,
    /// Log contents, stamped with their serials.
    pub log: Vec<(u64, Value)>,
    /// Everything each peer was handed, in order.
    pub peer_events: Vec<Vec<PeerEvent>>,
    /// Audit trail since the last reset.
    pub audit: Vec<AuditRecord>,
}

/// Model world.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    peers: Vec<ModelPeer>,
    log: Vec<Value>,
    audit: Vec<AuditRecord>,
    epoch: u64,
}

impl ModelWorld {
    /// Create a model with `num_peers` registered peers.
    pub fn new(num_peers: usize) -> Self {
        Self {
            peers: vec![ModelPeer::default(); num_peers],
            log: Vec::new(),
            audit: Vec::new(),
            epoch: 0,
        }
    }

    /// Number of registered peers.
    pub fn num_peers(&self) -> usize {
        self.peers.len()
    }

    /// Resets so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Events handed to the peer at `index`.
    pub fn peer_events(&self, index: PeerIndex) -> &[PeerEvent] {
        self.peers.get(usize::from(index)).map_or(&[], |peer| peer.events.as_slice())
    }

    /// Apply an operation and return the result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        let peer = match op {
            Operation::Send { peer, .. }
            | Operation::Connect { peer, .. }
            | Operation::Disconnect { peer } => Some(*peer),
            Operation::Clear => None,
        };
        if peer.is_some_and(|peer| usize::from(peer) >= self.peers.len()) {
            return OperationResult::Error(OperationError::UnknownPeer);
        }

        match op {
            Operation::Send { peer, seed } => self.apply_send(*peer, *seed),
            Operation::Connect { peer, seen, silent } => {
                self.apply_connect(*peer, u64::from(*seen), *silent);
            },
            Operation::Disconnect { peer } => self.peers[usize::from(*peer)].listening = false,
            Operation::Clear => self.apply_clear(),
        }

        OperationResult::Ok
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            serial: self.log.len() as u64,
            log: self.log.iter().enumerate().map(|(i, p)| (i as u64 + 1, p.clone())).collect(),
            peer_events: self.peers.iter().map(|peer| peer.events.clone()).collect(),
            audit: self.audit.clone(),
        }
    }

    fn apply_send(&mut self, sender: PeerIndex, seed: u8) {
        let payload = Operation::payload(seed);
        self.log.push(payload.clone());
        let serial = self.log.len() as u64;

        self.audit.push(AuditRecord::Sent { peer: peer_name(sender), serial });

        for (index, peer) in self.peers.iter_mut().enumerate() {
            let wants = peer.listening && peer.cursor.is_some_and(|cursor| cursor < serial);
            if !wants {
                continue;
            }

            self.audit.push(AuditRecord::Received { peer: name_at(index), serial });
            peer.events.push(PeerEvent::Batch(vec![ModelUpdate {
                serial,
                max_serial: serial,
                payload: payload.clone(),
            }]));
        }
    }

    fn apply_connect(&mut self, index: PeerIndex, seen: u64, silent: bool) {
        let position = usize::from(index);
        self.peers[position].clear_listener = Some(!silent);
        self.clear_path(position);

        let total = self.log.len() as u64;
        let batch = self
            .log
            .iter()
            .enumerate()
            .map(|(i, payload)| (i as u64 + 1, payload))
            .filter(|(serial, _)| *serial > seen)
            .map(|(serial, payload)| ModelUpdate {
                serial,
                max_serial: total,
                payload: payload.clone(),
            })
            .collect();

        let peer = &mut self.peers[position];
        peer.listening = true;
        peer.cursor = Some(seen);
        peer.events.push(PeerEvent::Batch(batch));
    }

    fn apply_clear(&mut self) {
        self.log.clear();
        self.audit.clear();
        self.epoch += 1;

        for peer in &mut self.peers {
            peer.notified = false;
            if peer.cursor.is_some() {
                peer.cursor = Some(0);
            }
        }
        for position in 0..self.peers.len() {
            self.clear_path(position);
        }
    }

    fn clear_path(&mut self, position: usize) {
        let peer = &mut self.peers[position];
        let Some(tell) = peer.clear_listener else {
            return;
        };
        if peer.notified {
            return;
        }

        peer.notified = true;
        if tell {
            peer.events.push(PeerEvent::Clear);
        }
        self.audit.push(AuditRecord::Clear { peer: name_at(position) });
    }
}

fn name_at(position: usize) -> String {
    peer_name(PeerIndex::try_from(position).unwrap_or(PeerIndex::MAX))
}
