//! Mock RsyncClient for unit testing
//!
//! Records every call, lets tests push readiness notifications into open
//! subscriptions, and can stand in for the synchronizer's status writes so
//! lifecycle code sees `Instantiated` after install and `Terminated` after
//! uninstall.

use crate::error::RsyncError;
use crate::proto::Notification;
use crate::rsync_trait::{NotificationStream, RsyncClientTrait};
use appcontext::{AppContext, AppContextStatus, ContextStoreTrait};
use futures::StreamExt;
use futures::channel::mpsc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A call observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RsyncCall {
    /// `InstallApp(id)`
    Install(String),
    /// `UninstallApp(id)`
    Uninstall(String),
    /// `ReadyNotify(id)`
    ReadyNotify(String),
    /// `Unsubscribe(id)`
    Unsubscribe(String),
}

type Sender = mpsc::UnboundedSender<Result<Notification, RsyncError>>;

/// Mock resource synchronizer client
#[derive(Clone, Default)]
pub struct MockRsyncClient {
    calls: Arc<Mutex<Vec<RsyncCall>>>,
    faults: Arc<Mutex<HashMap<&'static str, String>>>,
    subscribers: Arc<Mutex<HashMap<String, Sender>>>,
    contexts: Option<Arc<dyn ContextStoreTrait>>,
}

impl std::fmt::Debug for MockRsyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRsyncClient").finish_non_exhaustive()
    }
}

#[allow(clippy::unwrap_used, reason = "test double")]
impl MockRsyncClient {
    /// Create a mock that only records calls
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that also writes lifecycle statuses into the AppContext
    /// store, the way the real synchronizer does
    #[must_use]
    pub fn with_context_store(contexts: Arc<dyn ContextStoreTrait>) -> Self {
        Self {
            contexts: Some(contexts),
            ..Self::default()
        }
    }

    /// Make every subsequent call of `operation` (`install_app`,
    /// `uninstall_app`, `ready_notify`, `unsubscribe`) fail
    pub fn fail(&self, operation: &'static str, message: impl Into<String>) {
        self.faults.lock().unwrap().insert(operation, message.into());
    }

    /// Clear a failure set with [`MockRsyncClient::fail`]
    pub fn clear_failure(&self, operation: &'static str) {
        self.faults.lock().unwrap().remove(operation);
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<RsyncCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether a subscription is open for the context
    pub fn is_subscribed(&self, app_context_id: &str) -> bool {
        self.subscribers.lock().unwrap().contains_key(app_context_id)
    }

    /// Push a notification to the subscriber of a context.
    ///
    /// Returns `false` when nobody is subscribed.
    pub fn notify(&self, app_context_id: &str) -> bool {
        self.send(
            app_context_id,
            Ok(Notification {
                app_context: app_context_id.to_string(),
            }),
        )
    }

    /// Push a stream error to the subscriber of a context
    pub fn notify_error(&self, app_context_id: &str, message: impl Into<String>) -> bool {
        self.send(app_context_id, Err(RsyncError::Transport(message.into())))
    }

    fn send(&self, app_context_id: &str, item: Result<Notification, RsyncError>) -> bool {
        self.subscribers
            .lock()
            .unwrap()
            .get(app_context_id)
            .is_some_and(|tx| tx.unbounded_send(item).is_ok())
    }

    fn record(&self, call: RsyncCall, operation: &'static str) -> Result<(), RsyncError> {
        self.calls.lock().unwrap().push(call);
        match self.faults.lock().unwrap().get(operation) {
            Some(message) => Err(RsyncError::Transport(message.clone())),
            None => Ok(()),
        }
    }

    async fn write_status(&self, app_context_id: &str, status: AppContextStatus) -> Result<(), RsyncError> {
        if let Some(contexts) = &self.contexts {
            let ctx = AppContext::load(Arc::clone(contexts), app_context_id).await?;
            ctx.set_status(&status).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
#[allow(clippy::unwrap_used, reason = "test double")]
impl RsyncClientTrait for MockRsyncClient {
    async fn install_app(&self, app_context_id: &str) -> Result<(), RsyncError> {
        self.record(RsyncCall::Install(app_context_id.to_string()), "install_app")?;
        self.write_status(app_context_id, AppContextStatus::Instantiated).await
    }

    async fn uninstall_app(&self, app_context_id: &str) -> Result<(), RsyncError> {
        self.record(RsyncCall::Uninstall(app_context_id.to_string()), "uninstall_app")?;
        self.write_status(app_context_id, AppContextStatus::Terminated).await
    }

    async fn ready_notify(&self, app_context_id: &str) -> Result<NotificationStream, RsyncError> {
        self.record(RsyncCall::ReadyNotify(app_context_id.to_string()), "ready_notify")?;
        let (tx, rx) = mpsc::unbounded();
        self.subscribers
            .lock()
            .unwrap()
            .insert(app_context_id.to_string(), tx);
        Ok(rx.boxed())
    }

    async fn unsubscribe(&self, app_context_id: &str) -> Result<(), RsyncError> {
        self.record(RsyncCall::Unsubscribe(app_context_id.to_string()), "unsubscribe")?;
        self.subscribers.lock().unwrap().remove(app_context_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appcontext::MemoryContextStore;

    #[tokio::test]
    async fn test_notifications_reach_subscriber() {
        let mock = MockRsyncClient::new();
        let mut stream = mock.ready_notify("42").await.unwrap();

        assert!(mock.notify("42"));
        assert!(!mock.notify("43"));
        let msg = stream.next().await.unwrap().unwrap();
        assert_eq!(msg.app_context, "42");

        mock.unsubscribe("42").await.unwrap();
        assert!(!mock.is_subscribed("42"));
        // Sender dropped, so the stream ends
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_install_writes_status() {
        let backend: Arc<dyn ContextStoreTrait> = Arc::new(MemoryContextStore::new());
        let ctx = AppContext::init(Arc::clone(&backend)).await.unwrap();
        ctx.create_composite_app().await.unwrap();

        let mock = MockRsyncClient::with_context_store(Arc::clone(&backend));
        mock.install_app(ctx.id()).await.unwrap();
        assert_eq!(ctx.get_status().await.unwrap(), AppContextStatus::Instantiated);

        mock.uninstall_app(ctx.id()).await.unwrap();
        assert_eq!(ctx.get_status().await.unwrap(), AppContextStatus::Terminated);
        assert_eq!(
            mock.calls(),
            vec![
                RsyncCall::Install(ctx.id().to_string()),
                RsyncCall::Uninstall(ctx.id().to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let mock = MockRsyncClient::new();
        mock.fail("install_app", "rsync down");
        assert!(mock.install_app("1").await.is_err());
        mock.clear_failure("install_app");
        assert!(mock.install_app("1").await.is_ok());
    }
}
