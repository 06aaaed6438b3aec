//! Simulator configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::ServerError;

/// Configuration for the simulator runtime.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Interface to bind every listener to
    pub host: IpAddr,
    /// Port of the control surface; peers take the ports above it
    pub base_port: u16,
    /// Number of peers started up front
    pub instances: usize,
    /// Application name reported to peers and the dashboard
    pub app_name: String,
    /// Capacity of each per-peer relay channel
    pub relay_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            base_port: 7000,
            instances: 2,
            app_name: "peersim app".to_string(),
            relay_capacity: 256,
        }
    }
}

impl SimConfig {
    /// Address of the control surface.
    pub fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.base_port)
    }

    /// Check that the requested peers fit in the port range.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.relay_capacity == 0 {
            return Err(ServerError::Config("relay capacity must be non-zero".to_string()));
        }

        let last_port = u64::from(self.base_port) + self.instances as u64;
        if last_port > u64::from(u16::MAX) {
            return Err(ServerError::Config(format!(
                "{} instances above port {} exceed the port range",
                self.instances, self.base_port
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.control_addr().port(), 7000);
    }

    #[test]
    fn rejects_port_overflow() {
        let config = SimConfig { base_port: u16::MAX - 1, instances: 2, ..Default::default() };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn rejects_zero_relay_capacity() {
        let config = SimConfig { relay_capacity: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
