//! Main controller implementation.
//!
//! Wires the stores, the synchronizer client and the Logical Cloud service
//! together, serves the REST API and shuts readiness tasks down on exit.

use crate::api::{self, ApiState};
use crate::config::Config;
use crate::error::ControllerError;
use appcontext::{ContextStoreTrait, MemoryContextStore};
use dcm_store::{MemoryStore, StoreTrait};
use logical_cloud::{Backends, DcmService};
use rsync_client::{CloudConfigTrait, RsyncClient, RsyncClientTrait, RsyncEndpoint, StoreCloudConfig};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Main controller for Logical Cloud management.
pub struct Controller {
    config: Config,
    service: DcmService,
    registry: Arc<dyn StoreTrait>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Controller {
    /// Creates a new controller instance.
    pub fn new(config: Config) -> Self {
        info!("Initializing DCM Controller");

        let store: Arc<dyn StoreTrait> = Arc::new(MemoryStore::new());
        let contexts: Arc<dyn ContextStoreTrait> = Arc::new(MemoryContextStore::new());

        let endpoint = match &config.rsync_endpoint {
            Some(uri) => RsyncEndpoint::Static(uri.clone()),
            None => RsyncEndpoint::Registry(Arc::clone(&store)),
        };
        let rsync: Arc<dyn RsyncClientTrait> =
            Arc::new(RsyncClient::new(endpoint, config.rsync_connect_timeout));
        let cloud_configs: Arc<dyn CloudConfigTrait> =
            Arc::new(StoreCloudConfig::new(Arc::clone(&store)));

        let service = DcmService::new(
            Backends::new(Arc::clone(&store), contexts),
            rsync,
            cloud_configs,
            config.engine,
        );

        Self {
            config,
            service,
            registry: store,
        }
    }

    /// Runs the controller until the server fails or the process is
    /// interrupted.
    pub async fn run(self) -> Result<(), ControllerError> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        info!(address = %self.config.listen_addr, "DCM Controller listening");

        let app = api::router(ApiState {
            service: self.service.clone(),
            registry: Arc::clone(&self.registry),
        });
        let server = tokio::spawn(async move { axum::serve(listener, app).await });

        let result = tokio::select! {
            result = server => match result {
                Ok(Ok(())) => Err(ControllerError::Watch("HTTP server exited".to_string())),
                Ok(Err(e)) => Err(ControllerError::Io(e)),
                Err(e) => Err(ControllerError::Watch(format!("HTTP server panicked: {e}"))),
            },
            signal = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                signal.map_err(ControllerError::Io)
            }
        };

        self.service.shutdown().await;
        match &result {
            Ok(()) => info!("DCM Controller stopped"),
            Err(e) => error!(error = %e, "DCM Controller stopped"),
        }
        result
    }
}
