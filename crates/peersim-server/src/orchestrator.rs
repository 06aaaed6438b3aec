//! Orchestrator: peer lifecycle.
//!
//! Hands out consecutive ports above the base port, registers a broker
//! handle per peer and binds each peer's endpoint.

use std::{collections::BTreeMap, net::SocketAddr};

use tokio::{net::TcpListener, task::JoinHandle};

use crate::{
    config::SimConfig,
    driver::SharedDriver,
    endpoint::{Instance, InstanceInfo},
    error::ServerError,
};

/// Owns the set of simulated peers.
#[derive(Debug)]
pub struct Orchestrator {
    config: SimConfig,
    driver: SharedDriver,
    instances: BTreeMap<u16, Instance>,
    /// Serving tasks of started endpoints, by port
    servers: BTreeMap<u16, JoinHandle<()>>,
    current_port: u16,
}

impl Orchestrator {
    /// Create an orchestrator with no peers.
    pub fn new(config: SimConfig, driver: SharedDriver) -> Self {
        let current_port = config.base_port;
        Self { config, driver, instances: BTreeMap::new(), servers: BTreeMap::new(), current_port }
    }

    /// The driver peers are registered with.
    pub fn driver(&self) -> &SharedDriver {
        &self.driver
    }

    /// Register a new peer on the next free port.
    ///
    /// The peer is not reachable until [`start`](Self::start) binds it.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` when the port range is exhausted and
    /// `ServerError::Broker` when the peer id is already registered. The port
    /// is consumed either way.
    pub async fn add(&mut self) -> Result<Instance, ServerError> {
        let port = self
            .current_port
            .checked_add(1)
            .ok_or_else(|| ServerError::Config("no ports left for new instances".to_string()))?;

        // Claimed even if registration fails, so a taken id is skipped next time
        self.current_port = port;

        let instance = Instance::new(self.config.host, port);
        self.driver.lock().await.register_peer(instance.id().clone())?;

        tracing::info!(port, "instance added");
        self.instances.insert(port, instance.clone());
        Ok(instance)
    }

    /// Bind every registered peer that is not serving yet.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Transport` if a port cannot be bound. Peers bound
    /// before the failure keep serving.
    pub async fn start(&mut self) -> Result<(), ServerError> {
        for (port, instance) in &self.instances {
            if self.servers.contains_key(port) {
                continue;
            }

            let addr = SocketAddr::new(self.config.host, *port);
            let listener = TcpListener::bind(addr).await.map_err(|e| {
                tracing::error!(%addr, %e, "failed to bind instance");
                ServerError::Transport(format!("bind {addr}: {e}"))
            })?;

            let router = instance.router(self.driver.clone(), &self.config.app_name);
            let handle = tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, router).await {
                    tracing::error!(%addr, %e, "instance stopped");
                }
            });

            tracing::info!(%addr, "instance started");
            self.servers.insert(*port, handle);
        }

        Ok(())
    }

    /// Full reset of the broker; every peer is told to clear.
    pub async fn clear(&self) {
        self.driver.lock().await.clear();
    }

    /// Listing of all registered peers in port order.
    pub fn instances(&self) -> Vec<InstanceInfo> {
        self.instances.values().map(Instance::info).collect()
    }

    /// Whether the peer on `port` is serving.
    pub fn is_started(&self, port: u16) -> bool {
        self.servers.contains_key(&port)
    }

    /// Stop every serving endpoint.
    pub fn shutdown(&mut self) {
        for (port, handle) in std::mem::take(&mut self.servers) {
            handle.abort();
            tracing::debug!(port, "instance stopped");
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Driver;

    fn orchestrator(base_port: u16) -> Orchestrator {
        let config = SimConfig { base_port, ..Default::default() };
        Orchestrator::new(config, Driver::new(16).shared())
    }

    #[tokio::test]
    async fn add_assigns_consecutive_ports() {
        let mut orchestrator = orchestrator(9000);

        let first = orchestrator.add().await.unwrap();
        let second = orchestrator.add().await.unwrap();

        assert_eq!(first.port(), 9001);
        assert_eq!(second.id().as_str(), "9002");
        assert_eq!(orchestrator.instances(), vec![first.info(), second.info()]);
        assert!(!orchestrator.is_started(9001));
    }

    #[tokio::test]
    async fn add_registers_broker_handle() {
        let mut orchestrator = orchestrator(9000);
        orchestrator.add().await.unwrap();

        let driver = orchestrator.driver().lock().await;
        let ids: Vec<&str> = driver.broker().peer_ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["9001"]);
    }

    #[tokio::test]
    async fn add_fails_when_ports_run_out() {
        let mut orchestrator = orchestrator(u16::MAX);

        assert!(matches!(orchestrator.add().await, Err(ServerError::Config(_))));
        assert!(orchestrator.instances().is_empty());
    }

    #[tokio::test]
    async fn add_surfaces_duplicate_registration() {
        let mut orchestrator = orchestrator(9000);
        orchestrator.driver().lock().await.register_peer("9001".into()).unwrap();

        let result = orchestrator.add().await;

        assert!(matches!(result, Err(ServerError::Broker(_))));
        assert!(orchestrator.instances().is_empty());
    }

    #[tokio::test]
    async fn add_moves_past_taken_id() {
        let mut orchestrator = orchestrator(9000);
        orchestrator.driver().lock().await.register_peer("9001".into()).unwrap();
        assert!(orchestrator.add().await.is_err());

        let instance = orchestrator.add().await.unwrap();

        assert_eq!(instance.port(), 9002);
        assert_eq!(orchestrator.instances(), vec![instance.info()]);
    }
}
