//! Real broker wrapped to mirror [`ModelWorld`](crate::ModelWorld)'s
//! interface.
//!
//! Broker actions are executed into per-peer event lists, the way the
//! server's driver would relay them to sockets.

use peersim_core::{AuditEntry, Broker, BrokerAction, BrokerError, ClearNotice, PeerId, Update};

use crate::model::{
    AuditRecord, ModelUpdate, ObservableState, Operation, OperationError, OperationResult,
    PeerEvent, PeerIndex, peer_name,
};

/// A [`Broker`] plus everything its actions delivered.
#[derive(Debug)]
pub struct BrokerWorld {
    broker: Broker,
    ids: Vec<PeerId>,
    events: Vec<Vec<PeerEvent>>,
    /// `Record` actions seen since the last reset
    recorded: Vec<AuditEntry>,
}

impl BrokerWorld {
    /// Create a broker with `num_peers` registered handles.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::DuplicateRegistration` if the generated ids
    /// collide (more than 256 peers).
    pub fn new(num_peers: usize) -> Result<Self, BrokerError> {
        let mut broker = Broker::new();
        let mut ids = Vec::with_capacity(num_peers);

        for index in 0..num_peers {
            let id = PeerId::new(peer_name(PeerIndex::try_from(index).unwrap_or(PeerIndex::MAX)));
            broker.create_handle(id.clone())?;
            ids.push(id);
        }

        Ok(Self { broker, ids, events: vec![Vec::new(); num_peers], recorded: Vec::new() })
    }

    /// The wrapped broker.
    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Audit entries emitted as `Record` actions since the last reset.
    pub fn recorded(&self) -> &[AuditEntry] {
        &self.recorded
    }

    /// Apply an operation and return the result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        let result = match op {
            Operation::Send { peer, seed } => {
                let id = self.id(*peer);
                self.broker.send_update(&id, Operation::payload(*seed), "")
            },
            Operation::Connect { peer, seen, silent } => {
                let id = self.id(*peer);
                let notice = if *silent { ClearNotice::Silent } else { ClearNotice::Notify };
                self.broker.connect(&id, u64::from(*seen), notice)
            },
            Operation::Disconnect { peer } => {
                let id = self.id(*peer);
                self.broker.disconnect(&id).map(|()| Vec::new())
            },
            Operation::Clear => {
                self.recorded.clear();
                Ok(self.broker.clear())
            },
        };

        match result {
            Ok(actions) => {
                self.execute(actions);
                OperationResult::Ok
            },
            Err(BrokerError::UnknownPeer(_)) => OperationResult::Error(OperationError::UnknownPeer),
            Err(BrokerError::DuplicateRegistration(_)) => {
                OperationResult::Error(OperationError::DuplicatePeer)
            },
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            serial: self.broker.current_serial(),
            log: self
                .broker
                .log()
                .entries()
                .iter()
                .map(|update| (update.serial, update.payload.clone()))
                .collect(),
            peer_events: self.events.clone(),
            audit: self.broker.audit().iter().map(audit_record).collect(),
        }
    }

    fn id(&self, index: PeerIndex) -> PeerId {
        self.ids.get(usize::from(index)).cloned().unwrap_or_else(|| PeerId::new(peer_name(index)))
    }

    fn execute(&mut self, actions: Vec<BrokerAction>) {
        for action in actions {
            match action {
                BrokerAction::Deliver { peer_id, updates } => {
                    let batch = updates.iter().map(model_update).collect();
                    self.push(&peer_id, PeerEvent::Batch(batch));
                },
                BrokerAction::NotifyClear { peer_id } => self.push(&peer_id, PeerEvent::Clear),
                BrokerAction::Record(entry) => self.recorded.push(entry),
            }
        }
    }

    fn push(&mut self, peer_id: &PeerId, event: PeerEvent) {
        if let Some(position) = self.ids.iter().position(|id| id == peer_id) {
            self.events[position].push(event);
        }
    }
}

fn model_update(update: &Update) -> ModelUpdate {
    ModelUpdate {
        serial: update.serial,
        max_serial: update.max_serial,
        payload: update.payload.clone(),
    }
}

fn audit_record(entry: &AuditEntry) -> AuditRecord {
    match entry {
        AuditEntry::Sent { peer_id, update, .. } => {
            AuditRecord::Sent { peer: peer_id.to_string(), serial: update.serial }
        },
        AuditEntry::Received { peer_id, update } => {
            AuditRecord::Received { peer: peer_id.to_string(), serial: update.serial }
        },
        AuditEntry::Clear { peer_id } => AuditRecord::Clear { peer: peer_id.to_string() },
    }
}
