//! Peersim binary.
//!
//! # Usage
//!
//! ```bash
//! # Two peers on 7001 and 7002, dashboard on 7000
//! peersim
//!
//! # Four peers above port 8000
//! peersim --port 8000 --instances 4 --name "my app"
//! ```

use std::net::IpAddr;

use clap::Parser;
use peersim_server::{SimConfig, Simulator};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Simulate several peers of an app sharing one update broker
#[derive(Parser, Debug)]
#[command(name = "peersim")]
#[command(about = "Multi-peer update gossip simulator")]
#[command(version)]
struct Args {
    /// Control surface port; peers use the ports above it
    #[arg(short, long, default_value = "7000")]
    port: u16,

    /// Number of peers to start with
    #[arg(short, long, default_value = "2")]
    instances: usize,

    /// Application name reported to peers
    #[arg(short, long, default_value = "peersim app")]
    name: String,

    /// Interface to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Peersim starting");
    tracing::info!("Starting {} instances above port {}", args.instances, args.port);

    let config = SimConfig {
        host: args.host,
        base_port: args.port,
        instances: args.instances,
        app_name: args.name,
        ..Default::default()
    };

    let simulator = Simulator::bind(config).await?;

    tracing::info!("Control surface listening on {}", simulator.local_addr()?);

    simulator.run().await?;

    Ok(())
}
