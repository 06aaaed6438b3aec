//! Broker driver.
//!
//! Owns the [`Broker`] together with the outbound channels its actions are
//! executed against:
//!
//! - one broadcast relay per peer, fanned out to every socket of that peer
//! - one broadcast stream of audit entries for dashboards
//!
//! Actions are executed synchronously while the caller holds the driver, so
//! relayed batches leave in exactly the order the broker produced them.

use std::{collections::HashMap, sync::Arc};

use peersim_core::{AuditEntry, Broker, BrokerAction, ClearNotice, PeerId};
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};

use crate::{error::ServerError, protocol::ServerMessage};

/// Driver shared between endpoints and the control surface.
pub type SharedDriver = Arc<Mutex<Driver>>;

/// Capacity of the dashboard audit stream.
const AUDIT_CAPACITY: usize = 1024;

/// Executes broker actions against per-peer relays.
#[derive(Debug)]
pub struct Driver {
    broker: Broker,
    relays: HashMap<PeerId, broadcast::Sender<ServerMessage>>,
    audit: broadcast::Sender<AuditEntry>,
    relay_capacity: usize,
}

impl Driver {
    /// Create a driver around an empty broker.
    pub fn new(relay_capacity: usize) -> Self {
        let (audit, _) = broadcast::channel(AUDIT_CAPACITY);
        Self { broker: Broker::new(), relays: HashMap::new(), audit, relay_capacity }
    }

    /// Wrap the driver for sharing across tasks.
    pub fn shared(self) -> SharedDriver {
        Arc::new(Mutex::new(self))
    }

    /// Read access to the broker.
    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Register a broker handle and a relay for `peer_id`.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Broker` if the peer is already registered.
    pub fn register_peer(&mut self, peer_id: PeerId) -> Result<(), ServerError> {
        self.broker.create_handle(peer_id.clone())?;
        let (relay, _) = broadcast::channel(self.relay_capacity);
        self.relays.insert(peer_id, relay);
        Ok(())
    }

    /// Receiver for everything relayed to `peer_id`'s sockets.
    pub fn subscribe_relay(&self, peer_id: &PeerId) -> Option<broadcast::Receiver<ServerMessage>> {
        self.relays.get(peer_id).map(broadcast::Sender::subscribe)
    }

    /// Receiver for audit entries as they are recorded.
    pub fn subscribe_audit(&self) -> broadcast::Receiver<AuditEntry> {
        self.audit.subscribe()
    }

    /// Submit an update from `peer_id`.
    pub fn send_update(
        &mut self,
        peer_id: &PeerId,
        payload: Value,
        description: String,
    ) -> Result<(), ServerError> {
        let actions = self.broker.send_update(peer_id, payload, description)?;
        self.execute(actions);
        Ok(())
    }

    /// Subscribe `peer_id` having already seen `serial` updates.
    pub fn connect(&mut self, peer_id: &PeerId, serial: u64) -> Result<(), ServerError> {
        let actions = self.broker.connect(peer_id, serial, ClearNotice::Notify)?;
        self.execute(actions);
        Ok(())
    }

    /// Drop `peer_id`'s update listener (its last socket went away).
    pub fn disconnect(&mut self, peer_id: &PeerId) -> Result<(), ServerError> {
        self.broker.disconnect(peer_id)?;
        Ok(())
    }

    /// Reset the broker and notify every peer.
    pub fn clear(&mut self) {
        let actions = self.broker.clear();
        self.execute(actions);
    }

    fn execute(&self, actions: Vec<BrokerAction>) {
        for action in actions {
            match action {
                BrokerAction::Deliver { peer_id, updates } => {
                    self.relay(&peer_id, ServerMessage::Updates { updates });
                },
                BrokerAction::NotifyClear { peer_id } => {
                    self.relay(&peer_id, ServerMessage::Clear);
                },
                BrokerAction::Record(entry) => {
                    // No dashboard attached is fine
                    let _ = self.audit.send(entry);
                },
            }
        }
    }

    fn relay(&self, peer_id: &PeerId, message: ServerMessage) {
        let Some(relay) = self.relays.get(peer_id) else {
            tracing::error!(peer = %peer_id, "no relay for registered peer");
            return;
        };

        if relay.send(message).is_err() {
            tracing::debug!(peer = %peer_id, "no open sockets, message dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;

    #[test]
    fn register_twice_fails() {
        let mut driver = Driver::new(16);
        driver.register_peer(PeerId::from("7001")).unwrap();

        let result = driver.register_peer(PeerId::from("7001"));

        assert!(matches!(result, Err(ServerError::Broker(_))));
    }

    #[test]
    fn relay_only_reaches_its_own_peer() {
        let mut driver = Driver::new(16);
        let a = PeerId::from("7001");
        let b = PeerId::from("7002");
        driver.register_peer(a.clone()).unwrap();
        driver.register_peer(b.clone()).unwrap();
        let mut relay_a = driver.subscribe_relay(&a).unwrap();
        let mut relay_b = driver.subscribe_relay(&b).unwrap();

        driver.connect(&b, 0).unwrap();

        assert_eq!(relay_b.try_recv().unwrap(), ServerMessage::Clear);
        assert_eq!(relay_b.try_recv().unwrap(), ServerMessage::Updates { updates: vec![] });
        assert!(matches!(relay_a.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn audit_stream_mirrors_broker_trail() {
        let mut driver = Driver::new(16);
        let a = PeerId::from("7001");
        driver.register_peer(a.clone()).unwrap();
        let mut audit = driver.subscribe_audit();

        driver.connect(&a, 0).unwrap();
        driver.send_update(&a, json!(1), "one".to_string()).unwrap();

        let mut streamed = Vec::new();
        while let Ok(entry) = audit.try_recv() {
            streamed.push(entry);
        }
        assert_eq!(streamed, driver.broker().audit());
    }

    #[test]
    fn unknown_peer_has_no_relay() {
        let driver = Driver::new(16);
        assert!(driver.subscribe_relay(&PeerId::from("nope")).is_none());
    }
}
