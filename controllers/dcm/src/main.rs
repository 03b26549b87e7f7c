//! DCM Controller
//!
//! Distributed Cloud Manager: serves the Logical Cloud REST API, hands
//! instantiated Logical Clouds to the resource synchronizer and assembles
//! per-cluster user kubeconfigs.

mod api;
mod config;
mod controller;
mod error;

use crate::config::Config;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting DCM Controller");

    let config = Config::from_env()?;
    info!("Configuration:");
    info!("  Listen address: {}", config.listen_addr);
    info!(
        "  Resource synchronizer: {}",
        config.rsync_endpoint.as_deref().unwrap_or("controller registry")
    );
    info!("  RSA key size: {}", config.engine.key_bits);

    Controller::new(config).run().await
}
