//! Termination and stop

use super::LifecycleEngine;
use crate::binding::Binding;
use crate::error::{ConflictReason, DcmError};
use crate::models::{ClusterReference, LogicalCloud};
use appcontext::{AppContext, AppContextStatus};
use tracing::{debug, info, warn};

impl LifecycleEngine {
    async fn terminable_context(&self, project: &str, name: &str) -> Result<AppContext, DcmError> {
        let reason = match self.backends.binding(project, name).await? {
            Binding::Unbound => {
                return Err(DcmError::NotInstantiated(format!(
                    "Logical Cloud {name} hasn't been instantiated"
                )));
            }
            Binding::Pending(ctx) => {
                return Err(DcmError::NotInstantiated(format!(
                    "Logical Cloud {name} was never installed (AppContext {}); instantiate or delete it",
                    ctx.id()
                )));
            }
            Binding::Bound(
                ctx,
                AppContextStatus::Instantiated
                | AppContextStatus::InstantiateFailed
                | AppContextStatus::TerminateFailed,
            ) => return Ok(ctx),
            Binding::Bound(_, AppContextStatus::Terminated) => ConflictReason::AlreadyTerminated,
            Binding::Bound(_, AppContextStatus::Terminating) => ConflictReason::AlreadyTerminating,
            Binding::Bound(_, AppContextStatus::Instantiating) => ConflictReason::StillInstantiating,
            Binding::Bound(_, other) => ConflictReason::UnexpectedStatus(other.to_string()),
        };
        warn!(project, logical_cloud = name, %reason, "refusing to terminate");
        Err(DcmError::conflict(reason))
    }

    /// Terminate a Logical Cloud on its clusters.
    ///
    /// For Level-1 clouds the user kubeconfigs registered with CloudConfig
    /// are removed too; missing entries are only logged.
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotInstantiated`] without an installed AppContext,
    /// [`DcmError::Conflict`] while terminated, terminating or still
    /// instantiating, and [`DcmError::Internal`] when `UninstallApp` fails.
    pub async fn terminate(
        &self,
        project: &str,
        lc: &LogicalCloud,
        clusters: &[ClusterReference],
    ) -> Result<(), DcmError> {
        let name = lc.name();
        let ctx = self.terminable_context(project, name).await?;

        self.stop_watching(ctx.id()).await;
        self.rsync
            .uninstall_app(ctx.id())
            .await
            .map_err(|e| DcmError::internal("uninstalling AppContext", e))?;
        info!(project, logical_cloud = name, app_context = ctx.id(), "Logical Cloud uninstalled");

        if lc.is_admin_level() {
            return Ok(());
        }
        for reference in clusters {
            let provider = &reference.spec.cluster_provider;
            let cluster = &reference.spec.cluster_name;
            match self
                .cloud_configs
                .delete_cloud_config(provider, cluster, lc.level(), &lc.spec.namespace)
                .await
            {
                Ok(()) => debug!(project, logical_cloud = name, cluster = %reference.full_name(), "deleted user CloudConfig"),
                Err(e) => warn!(
                    project,
                    logical_cloud = name,
                    cluster = %reference.full_name(),
                    error = %e,
                    "failed to delete user CloudConfig"
                ),
            }
        }
        Ok(())
    }

    /// Retry `UninstallApp` for a Logical Cloud whose termination failed.
    /// Other states are left alone; uninstall errors are only logged.
    ///
    /// # Errors
    ///
    /// Propagates errors reading the binding.
    pub async fn uninstall_failed_termination(&self, project: &str, name: &str) -> Result<(), DcmError> {
        let Binding::Bound(ctx, AppContextStatus::TerminateFailed) = self.backends.binding(project, name).await? else {
            return Ok(());
        };
        self.stop_watching(ctx.id()).await;
        match self.rsync.uninstall_app(ctx.id()).await {
            Ok(()) => info!(project, logical_cloud = name, app_context = ctx.id(), "uninstalled after failed termination"),
            Err(e) => warn!(
                project,
                logical_cloud = name,
                app_context = ctx.id(),
                error = %e,
                "best-effort uninstall failed"
            ),
        }
        Ok(())
    }

    /// Stop an in-flight transition. Not supported: the call only reports
    /// whether there is a transition to stop.
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotInstantiated`] without an AppContext,
    /// [`DcmError::Conflict`] outside a transition and
    /// [`DcmError::NotImplemented`] otherwise.
    pub async fn stop(&self, project: &str, name: &str) -> Result<(), DcmError> {
        match self.backends.binding(project, name).await? {
            Binding::Unbound | Binding::Pending(_) => Err(DcmError::NotInstantiated(format!(
                "Logical Cloud {name} hasn't been instantiated"
            ))),
            Binding::Bound(_, AppContextStatus::Instantiating | AppContextStatus::Terminating) => {
                Err(DcmError::NotImplemented("Logical Clouds can't be stopped".to_string()))
            }
            Binding::Bound(_, status) => {
                debug!(project, logical_cloud = name, %status, "nothing to stop");
                Err(DcmError::conflict(ConflictReason::NotTransitioning))
            }
        }
    }
}
