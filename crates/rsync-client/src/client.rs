//! gRPC client for the resource synchronizer
//!
//! Messages are plain prost structs (see [`crate::proto`]) driven through
//! `tonic::client::Grpc`, so no generated stubs are needed. The channel is
//! created on first use and shared by every later call.

use crate::error::RsyncError;
use crate::proto::{
    InstallAppRequest, InstallAppResponse, Notification, Topic, UninstallAppRequest,
    UninstallAppResponse, UnsubscribeResponse, paths,
};
use crate::registry::{RSYNC_NAME, find_controller};
use crate::rsync_trait::{NotificationStream, RsyncClientTrait};
use dcm_store::StoreTrait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info};

/// Name this process subscribes to notifications with
pub const CLIENT_NAME: &str = "dcm";

/// Where to find the synchronizer
#[derive(Clone)]
pub enum RsyncEndpoint {
    /// Fixed URI such as `http://rsync:9031`
    Static(String),
    /// Resolve the `rsync` controller from the registry on every call
    Registry(Arc<dyn StoreTrait>),
}

impl std::fmt::Debug for RsyncEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(uri) => f.debug_tuple("Static").field(uri).finish(),
            Self::Registry(_) => f.write_str("Registry"),
        }
    }
}

/// gRPC client for the resource synchronizer
#[derive(Debug)]
pub struct RsyncClient {
    endpoint: RsyncEndpoint,
    connect_timeout: Duration,
    channel: OnceCell<Channel>,
}

impl RsyncClient {
    /// Create a client. No connection is made until the first call.
    #[must_use]
    pub fn new(endpoint: RsyncEndpoint, connect_timeout: Duration) -> Self {
        Self {
            endpoint,
            connect_timeout,
            channel: OnceCell::new(),
        }
    }

    async fn resolve(&self) -> Result<String, RsyncError> {
        match &self.endpoint {
            RsyncEndpoint::Static(uri) => Ok(uri.clone()),
            RsyncEndpoint::Registry(store) => {
                let controller = find_controller(store.as_ref(), RSYNC_NAME).await?;
                debug!(
                    controller = %controller.metadata.name,
                    endpoint = %controller.endpoint(),
                    "resolved resource synchronizer"
                );
                Ok(controller.endpoint())
            }
        }
    }

    async fn channel(&self) -> Result<Channel, RsyncError> {
        let uri = self.resolve().await?;
        let channel = self
            .channel
            .get_or_try_init(|| async {
                info!(endpoint = %uri, "Initializing RPC connection to resource synchronizer");
                let channel = Endpoint::from_shared(uri)?
                    .connect_timeout(self.connect_timeout)
                    .connect()
                    .await?;
                Ok::<_, RsyncError>(channel)
            })
            .await?;
        Ok(channel.clone())
    }

    async fn grpc(&self) -> Result<tonic::client::Grpc<Channel>, RsyncError> {
        let mut grpc = tonic::client::Grpc::new(self.channel().await?);
        grpc.ready().await?;
        Ok(grpc)
    }

    async fn unary<Req, Resp>(&self, path: &'static str, request: Req) -> Result<Resp, RsyncError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.grpc().await?;
        let response = grpc
            .unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(path),
                ProstCodec::<Req, Resp>::default(),
            )
            .await?;
        Ok(response.into_inner())
    }

    fn topic(app_context_id: &str) -> Topic {
        Topic {
            client_name: CLIENT_NAME.to_string(),
            app_context: app_context_id.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl RsyncClientTrait for RsyncClient {
    async fn install_app(&self, app_context_id: &str) -> Result<(), RsyncError> {
        info!(app_context = %app_context_id, "Calling rsync InstallApp");
        let response: InstallAppResponse = self
            .unary(
                paths::INSTALL_APP,
                InstallAppRequest {
                    app_context: app_context_id.to_string(),
                },
            )
            .await?;
        if !response.app_context_installed {
            return Err(RsyncError::Rejected(response.app_context_install_message));
        }
        Ok(())
    }

    async fn uninstall_app(&self, app_context_id: &str) -> Result<(), RsyncError> {
        info!(app_context = %app_context_id, "Calling rsync UninstallApp");
        let response: UninstallAppResponse = self
            .unary(
                paths::UNINSTALL_APP,
                UninstallAppRequest {
                    app_context: app_context_id.to_string(),
                },
            )
            .await?;
        if !response.app_context_uninstalled {
            return Err(RsyncError::Rejected(response.app_context_uninstall_message));
        }
        Ok(())
    }

    async fn ready_notify(&self, app_context_id: &str) -> Result<NotificationStream, RsyncError> {
        info!(app_context = %app_context_id, "Subscribing to rsync readiness alerts");
        let mut grpc = self.grpc().await?;
        let response = grpc
            .server_streaming(
                tonic::Request::new(Self::topic(app_context_id)),
                PathAndQuery::from_static(paths::ALERT),
                ProstCodec::<Topic, Notification>::default(),
            )
            .await?;
        Ok(response
            .into_inner()
            .map(|item| item.map_err(RsyncError::from))
            .boxed())
    }

    async fn unsubscribe(&self, app_context_id: &str) -> Result<(), RsyncError> {
        info!(app_context = %app_context_id, "Unsubscribing from rsync readiness alerts");
        let _: UnsubscribeResponse = self
            .unary(paths::UNSUBSCRIBE, Self::topic(app_context_id))
            .await?;
        Ok(())
    }
}
