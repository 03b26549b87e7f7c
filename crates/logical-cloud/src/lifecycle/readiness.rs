//! Readiness notifications
//!
//! After install, the synchronizer notifies on every per-cluster status
//! change. Once every cluster reports an issued certificate, the user
//! kubeconfigs are assembled and the subscription is dropped. Errors never
//! drop the subscription; they delay it.

use super::LifecycleEngine;
use crate::backoff::{FibonacciBackoff, MAX_RETRY_SECS};
use crate::binding::Backends;
use crate::error::DcmError;
use crate::kubeconfig::KubeconfigAssembler;
use crate::manager::ClusterManager;
use appcontext::{AppContext, AppContextError, ResourceBundleStatus};
use futures::StreamExt;
use rsync_client::{NotificationStream, RsyncClientTrait};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a subscription ended
enum Outcome {
    Ready,
    Cancelled,
    Closed,
}

/// State a readiness task needs, detached from the engine
#[derive(Clone)]
pub(super) struct ReadinessHandler {
    pub(super) backends: Backends,
    pub(super) clusters: ClusterManager,
    pub(super) kubeconfigs: KubeconfigAssembler,
    pub(super) rsync: Arc<dyn RsyncClientTrait>,
    pub(super) retry_secs: u64,
}

/// Sleep for the next backoff step; `false` when cancelled meanwhile
async fn pause(backoff: &mut FibonacciBackoff, token: &CancellationToken) -> bool {
    let delay = backoff.next_backoff();
    tokio::select! {
        () = token.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

/// Whether every cluster of every app reports an issued certificate
pub(crate) async fn all_certificates_issued(ctx: &AppContext) -> Result<bool, DcmError> {
    let mut clusters = 0usize;
    for app in ctx.get_app_names().await? {
        for cluster in ctx.get_cluster_names(&app).await? {
            clusters += 1;
            let handle = match ctx.get_cluster_status_handle(&app, &cluster).await {
                Ok(handle) => handle,
                Err(AppContextError::NotFound(_)) => {
                    debug!(app_context = ctx.id(), cluster = %cluster, "no status yet");
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            };
            let status = ResourceBundleStatus::from_value(&ctx.get_value(&handle).await?)?;
            if !status.certificate_ready() {
                debug!(app_context = ctx.id(), cluster = %cluster, "certificate not issued yet");
                return Ok(false);
            }
        }
    }
    Ok(clusters > 0)
}

impl ReadinessHandler {
    /// Process one notification. Returns whether the Logical Cloud is ready.
    async fn handle_notification(&self, app_context_id: &str) -> Result<bool, DcmError> {
        let ctx = AppContext::load(Arc::clone(&self.backends.contexts), app_context_id).await?;
        if !all_certificates_issued(&ctx).await? {
            return Ok(false);
        }

        let key = self.backends.resolve(app_context_id).await?;
        let project = key.project.as_str();
        let logical_cloud = key.logical_cloud_name.as_str();
        let references = self.clusters.get_all(project, logical_cloud).await?;
        if references.is_empty() {
            return Err(DcmError::Internal(format!(
                "Logical Cloud {logical_cloud} has no Cluster References"
            )));
        }

        for reference in &references {
            self.kubeconfigs
                .get_cluster_config(project, logical_cloud, reference.name())
                .await?;
        }
        info!(
            project,
            logical_cloud,
            app_context = app_context_id,
            clusters = references.len(),
            "all user certificates issued, kubeconfigs stored"
        );
        Ok(true)
    }

    async fn consume(
        &self,
        app_context_id: &str,
        mut stream: NotificationStream,
        backoff: &mut FibonacciBackoff,
        token: &CancellationToken,
    ) -> Outcome {
        loop {
            let item = tokio::select! {
                () = token.cancelled() => return Outcome::Cancelled,
                item = stream.next() => item,
            };
            match item {
                None => return Outcome::Closed,
                Some(Err(e)) => {
                    warn!(app_context = app_context_id, error = %e, "readiness stream error");
                    if !pause(backoff, token).await {
                        return Outcome::Cancelled;
                    }
                }
                Some(Ok(notification)) => {
                    debug!(app_context = %notification.app_context, "readiness notification");
                    match self.handle_notification(app_context_id).await {
                        Ok(true) => return Outcome::Ready,
                        Ok(false) => backoff.reset(),
                        Err(e) => {
                            warn!(app_context = app_context_id, error = %e, "failed to process readiness notification");
                            if !pause(backoff, token).await {
                                return Outcome::Cancelled;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Run until the Logical Cloud is ready or `token` is cancelled.
    /// Without an initial `stream` the task subscribes itself.
    pub(super) async fn run(
        self,
        app_context_id: String,
        mut stream: Option<NotificationStream>,
        token: CancellationToken,
    ) {
        let id = app_context_id.as_str();
        let mut backoff = FibonacciBackoff::new(self.retry_secs, MAX_RETRY_SECS);

        loop {
            let current = match stream.take() {
                Some(current) => current,
                None => {
                    let subscribed = tokio::select! {
                        () = token.cancelled() => return,
                        result = self.rsync.ready_notify(id) => result,
                    };
                    match subscribed {
                        Ok(current) => current,
                        Err(e) => {
                            warn!(app_context = id, error = %e, "failed to subscribe to readiness notifications");
                            if !pause(&mut backoff, &token).await {
                                return;
                            }
                            continue;
                        }
                    }
                }
            };

            match self.consume(id, current, &mut backoff, &token).await {
                Outcome::Ready => {
                    if let Err(e) = self.rsync.unsubscribe(id).await {
                        warn!(app_context = id, error = %e, "failed to unsubscribe from readiness notifications");
                    }
                    return;
                }
                Outcome::Cancelled => {
                    debug!(app_context = id, "readiness task cancelled");
                    return;
                }
                Outcome::Closed => {
                    warn!(app_context = id, "readiness stream closed, resubscribing");
                    if !pause(&mut backoff, &token).await {
                        return;
                    }
                }
            }
        }
    }
}

impl LifecycleEngine {
    /// Subscribe to readiness notifications of an installed AppContext and
    /// hand the stream to a supervised task. A failed subscription is retried
    /// by the task.
    pub(super) async fn watch_readiness(&self, app_context_id: &str) {
        let stream = match self.rsync.ready_notify(app_context_id).await {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!(app_context = app_context_id, error = %e, "readiness subscription failed, retrying in background");
                None
            }
        };
        let handler = self.readiness_handler();
        let id = app_context_id.to_string();
        self.supervisor
            .spawn(app_context_id, move |token| handler.run(id, stream, token));
    }

    /// Stop watching an AppContext, dropping its subscription if a task was
    /// running
    pub(super) async fn stop_watching(&self, app_context_id: &str) {
        if !self.supervisor.cancel(app_context_id) {
            return;
        }
        if let Err(e) = self.rsync.unsubscribe(app_context_id).await {
            warn!(app_context = app_context_id, error = %e, "failed to unsubscribe from readiness notifications");
        }
    }
}
