//! RsyncClient trait for mocking
//!
//! This trait abstracts the synchronizer RPCs. The gRPC client implements it,
//! and tests use [`crate::mock::MockRsyncClient`].

use crate::error::RsyncError;
use crate::proto::Notification;
use futures::stream::BoxStream;

/// Stream of readiness notifications for one AppContext
pub type NotificationStream = BoxStream<'static, Result<Notification, RsyncError>>;

/// Trait for resource synchronizer operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait RsyncClientTrait: Send + Sync {
    /// Ask the synchronizer to apply an AppContext
    async fn install_app(&self, app_context_id: &str) -> Result<(), RsyncError>;

    /// Ask the synchronizer to remove what an AppContext applied
    async fn uninstall_app(&self, app_context_id: &str) -> Result<(), RsyncError>;

    /// Subscribe to status-change notifications for an AppContext
    async fn ready_notify(&self, app_context_id: &str) -> Result<NotificationStream, RsyncError>;

    /// End a subscription made with [`RsyncClientTrait::ready_notify`]
    async fn unsubscribe(&self, app_context_id: &str) -> Result<(), RsyncError>;
}
