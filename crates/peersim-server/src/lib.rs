//! Peersim server runtime.
//!
//! This crate wires the Sans-IO broker to the network:
//! - Axum WebSocket endpoints, one port per simulated peer
//! - Tokio broadcast channels relaying broker output to every socket
//! - An HTTP control surface for the developer dashboard
//!
//! ## Architecture
//!
//! ```text
//! peersim-server
//!   ├─ Simulator       (runtime entry point)
//!   ├─ Orchestrator    (peer lifecycle, port assignment)
//!   ├─ Instance        (per-peer WebSocket endpoint)
//!   ├─ Driver          (executes BrokerActions against relays)
//!   ├─ control         (dashboard HTTP routes)
//!   └─ protocol        (JSON wire format)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod color;
mod config;
pub mod control;
mod driver;
mod endpoint;
mod error;
mod orchestrator;
pub mod protocol;

use std::{net::SocketAddr, sync::Arc};

pub use color::color_for_id;
pub use config::SimConfig;
pub use control::ControlState;
pub use driver::{Driver, SharedDriver};
pub use endpoint::{Instance, InstanceInfo, SOCKET_PATH};
pub use error::ServerError;
pub use orchestrator::Orchestrator;
use tokio::{net::TcpListener, sync::Mutex};

/// The running simulator: peer endpoints plus the control surface.
pub struct Simulator {
    orchestrator: Arc<Mutex<Orchestrator>>,
    driver: SharedDriver,
    listener: TcpListener,
    app_name: String,
}

impl Simulator {
    /// Start the configured number of peers and bind the control surface.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The configuration is invalid
    /// - Any peer port or the control port cannot be bound
    pub async fn bind(config: SimConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let driver = Driver::new(config.relay_capacity).shared();
        let mut orchestrator = Orchestrator::new(config.clone(), Arc::clone(&driver));

        for _ in 0..config.instances {
            orchestrator.add().await?;
        }
        orchestrator.start().await?;

        let listener = TcpListener::bind(config.control_addr()).await?;

        Ok(Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            driver,
            listener,
            app_name: config.app_name,
        })
    }

    /// Address of the control surface.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve the control surface until the process is stopped.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Dashboard available at http://{}", self.local_addr()?);

        let state = ControlState::new(self.orchestrator, self.driver, &self.app_name);
        axum::serve(self.listener, control::router(state)).await?;

        Ok(())
    }
}
