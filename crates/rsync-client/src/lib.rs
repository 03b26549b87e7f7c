//! Resource synchronizer client
//!
//! The orchestrator hands AppContexts to the resource synchronizer (rsync)
//! over gRPC and listens for readiness notifications. This crate provides:
//!
//! - [`RsyncClientTrait`] with the gRPC implementation [`RsyncClient`]
//! - the CloudConfig store shared with the synchronizer ([`CloudConfigTrait`])
//! - controller registry lookup used to find the synchronizer endpoint
//!
//! # Example
//!
//! ```no_run
//! use rsync_client::{RsyncClient, RsyncClientTrait, RsyncEndpoint};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), rsync_client::RsyncError> {
//! let client = RsyncClient::new(
//!     RsyncEndpoint::Static("http://rsync:9031".to_string()),
//!     Duration::from_secs(10),
//! );
//! client.install_app("7254719264627").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod cloudconfig;
pub mod error;
pub mod proto;
pub mod registry;
#[path = "trait.rs"]
pub mod rsync_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{CLIENT_NAME, RsyncClient, RsyncEndpoint};
pub use cloudconfig::{CloudConfig, CloudConfigTrait, StoreCloudConfig};
pub use error::RsyncError;
pub use proto::Notification;
pub use registry::{Controller, RSYNC_NAME, find_controller, register_controller};
pub use rsync_trait::{NotificationStream, RsyncClientTrait};
#[cfg(feature = "test-util")]
pub use mock::{MockRsyncClient, RsyncCall};
