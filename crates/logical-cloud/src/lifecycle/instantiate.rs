//! Instantiation of Logical Clouds

use super::LifecycleEngine;
use crate::binding::Binding;
use crate::error::{ConflictReason, DcmError};
use crate::models::{
    ClusterReference, LOGICAL_CLOUD_APP, LogicalCloud, LogicalCloudKey, ORCHESTRATOR_COLLECTION,
    Quota, ToStoreKey, UserPermission, tags,
};
use crate::render::{self, ResourceBundle};
use appcontext::{AppContext, AppContextStatus, Handle, InstructionKind, InstructionLevel};
use dcm_store::insert_value;
use rsync_client::RsyncError;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn instantiate_conflict(status: &AppContextStatus) -> ConflictReason {
    match status {
        AppContextStatus::Terminating => ConflictReason::BeingTerminated,
        AppContextStatus::Instantiated => ConflictReason::AlreadyInstantiated,
        AppContextStatus::Instantiating => ConflictReason::AlreadyInstantiating,
        AppContextStatus::InstantiateFailed | AppContextStatus::TerminateFailed => {
            ConflictReason::MustTerminateFirst
        }
        other => ConflictReason::UnexpectedStatus(other.to_string()),
    }
}

fn app_order() -> Value {
    json!({ "apporder": [LOGICAL_CLOUD_APP] })
}

fn app_dependencies() -> Value {
    json!({ "appdependency": { LOGICAL_CLOUD_APP: "go" } })
}

/// Level-1 preconditions: a quota and a permission on the cloud's namespace
fn validate_standard(lc: &LogicalCloud, quotas: &[Quota], permissions: &[UserPermission]) -> Result<(), DcmError> {
    if lc.spec.namespace.is_empty() {
        return Err(DcmError::PreconditionMissing(format!(
            "Logical Cloud {} has no namespace to create",
            lc.name()
        )));
    }
    if permissions.is_empty() {
        return Err(DcmError::PreconditionMissing(format!(
            "Logical Cloud {} has no User Permissions",
            lc.name()
        )));
    }
    if !permissions.iter().any(|p| p.spec.namespace == lc.spec.namespace) {
        return Err(DcmError::PreconditionMissing(format!(
            "Logical Cloud {} has no User Permission for its primary namespace {}",
            lc.name(),
            lc.spec.namespace
        )));
    }
    if quotas.is_empty() {
        return Err(DcmError::PreconditionMissing(format!(
            "Logical Cloud {} has no Cluster Quotas",
            lc.name()
        )));
    }
    Ok(())
}

impl LifecycleEngine {
    /// Instantiate a Logical Cloud on its clusters.
    ///
    /// A Level-0 cloud adopts the namespace its clusters already share and
    /// gets an empty AppContext. A Level-1 cloud gets a fresh user key pair
    /// and one resource bundle per cluster; once installed, a readiness task
    /// collects the issued certificates.
    ///
    /// An AppContext left without status by a failed install is installed
    /// again as is.
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::Conflict`] unless the cloud is unbound or its
    /// AppContext is `Terminated`, [`DcmError::PreconditionMissing`] /
    /// [`DcmError::PreconditionMixedNamespaces`] for unusable inputs, and
    /// [`DcmError::Internal`] for store or rsync failures.
    pub async fn instantiate(
        &self,
        project: &str,
        lc: &LogicalCloud,
        clusters: &[ClusterReference],
        quotas: &[Quota],
        permissions: &[UserPermission],
    ) -> Result<(), DcmError> {
        let name = lc.name();
        let previous = match self.backends.binding(project, name).await? {
            Binding::Unbound => None,
            Binding::Pending(ctx) => return self.resume_install(project, lc, &ctx).await,
            Binding::Bound(ctx, AppContextStatus::Terminated) => Some(ctx),
            Binding::Bound(_, status) => {
                let reason = instantiate_conflict(&status);
                warn!(project, logical_cloud = name, %status, "refusing to instantiate");
                return Err(DcmError::conflict(reason));
            }
        };

        if clusters.is_empty() {
            return Err(DcmError::PreconditionMissing(format!(
                "Logical Cloud {name} has no Cluster References"
            )));
        }

        if lc.is_admin_level() {
            let namespace = self.shared_namespace(clusters).await?;
            self.release_previous(project, name, previous.as_ref()).await?;
            self.instantiate_admin(project, lc, clusters, namespace).await
        } else {
            validate_standard(lc, quotas, permissions)?;
            self.release_previous(project, name, previous.as_ref()).await?;
            self.instantiate_standard(project, lc, clusters, quotas, permissions).await
        }
    }

    /// Drop a `Terminated` AppContext before building its successor
    async fn release_previous(&self, project: &str, name: &str, previous: Option<&AppContext>) -> Result<(), DcmError> {
        let Some(ctx) = previous else {
            return Ok(());
        };
        info!(project, logical_cloud = name, app_context = ctx.id(), "releasing terminated AppContext");
        self.stop_watching(ctx.id()).await;
        self.backends.unbind(project, name, ctx.id()).await?;
        ctx.delete_composite_app()
            .await
            .map_err(|e| DcmError::internal("deleting terminated AppContext", e))
    }

    async fn resume_install(&self, project: &str, lc: &LogicalCloud, ctx: &AppContext) -> Result<(), DcmError> {
        info!(project, logical_cloud = lc.name(), app_context = ctx.id(), "AppContext was never installed, retrying install");
        self.install(project, lc, ctx.id()).await
    }

    async fn install(&self, project: &str, lc: &LogicalCloud, id: &str) -> Result<(), DcmError> {
        self.rsync.install_app(id).await.map_err(|e| {
            error!(project, logical_cloud = lc.name(), app_context = id, error = %e, "InstallApp failed");
            DcmError::internal("installing AppContext", e)
        })?;
        info!(project, logical_cloud = lc.name(), app_context = id, level = lc.level(), "Logical Cloud installed");

        if !lc.is_admin_level() {
            self.watch_readiness(id).await;
        }
        Ok(())
    }

    /// Namespace every cluster was registered with; all must agree
    async fn shared_namespace(&self, clusters: &[ClusterReference]) -> Result<String, DcmError> {
        let mut shared: Option<(String, String)> = None;
        for reference in clusters {
            let namespace = self
                .cloud_configs
                .get_namespace(&reference.spec.cluster_provider, &reference.spec.cluster_name)
                .await
                .map_err(|e| match e {
                    RsyncError::CloudConfigNotFound(_) => DcmError::NotFound(format!(
                        "Cluster {} provided as reference",
                        reference.full_name()
                    )),
                    other => DcmError::internal("reading cluster namespace", other),
                })?;

            match &shared {
                None => shared = Some((namespace, reference.full_name())),
                Some((first, first_cluster)) if *first != namespace => {
                    return Err(DcmError::PreconditionMixedNamespaces(format!(
                        "{first_cluster} uses {first}, {} uses {namespace}",
                        reference.full_name()
                    )));
                }
                Some(_) => {}
            }
        }
        shared.map(|(namespace, _)| namespace).ok_or_else(|| {
            DcmError::PreconditionMissing("Logical Cloud has no Cluster References".to_string())
        })
    }

    /// Delete a partially built AppContext, keeping `original` as the cause
    async fn abandon(&self, ctx: &AppContext, original: DcmError) -> DcmError {
        error!(app_context = ctx.id(), error = %original, "building AppContext failed, deleting it");
        let cleanup = match ctx.delete_composite_app().await {
            Ok(()) => None,
            Err(e) => {
                error!(app_context = ctx.id(), error = %e, "failed to delete partial AppContext");
                Some(DcmError::internal("deleting partial AppContext", e))
            }
        };
        DcmError::with_cleanup(original, cleanup)
    }

    async fn instantiate_admin(
        &self,
        project: &str,
        lc: &LogicalCloud,
        clusters: &[ClusterReference],
        namespace: String,
    ) -> Result<(), DcmError> {
        let mut lc = lc.clone();
        if lc.spec.namespace != namespace {
            debug!(project, logical_cloud = lc.name(), namespace = %namespace, "adopting cluster namespace");
            lc.spec.namespace = namespace;
            self.logical_clouds.store(project, &lc).await?;
        }

        let ctx = AppContext::init(Arc::clone(&self.backends.contexts)).await?;
        if let Err(e) = self.build_admin_context(&ctx, clusters).await {
            return Err(self.abandon(&ctx, e).await);
        }
        if let Err(e) = self.backends.bind(project, lc.name(), ctx.id()).await {
            return Err(self.abandon(&ctx, e).await);
        }
        self.install(project, &lc, ctx.id()).await
    }

    async fn build_admin_context(&self, ctx: &AppContext, clusters: &[ClusterReference]) -> Result<(), DcmError> {
        let composite = ctx.create_composite_app().await?;
        let app = ctx.add_app(&composite, LOGICAL_CLOUD_APP).await?;
        for reference in clusters {
            let cluster = ctx.add_cluster(&app, &reference.full_name()).await?;
            ctx.add_instruction(
                &cluster,
                InstructionLevel::Resource,
                InstructionKind::Order,
                &json!({ "resorder": [] }),
            )
            .await?;
        }
        ctx.add_instruction(&composite, InstructionLevel::App, InstructionKind::Order, &app_order())
            .await?;
        ctx.add_instruction(&composite, InstructionLevel::App, InstructionKind::Dependency, &app_dependencies())
            .await?;
        Ok(())
    }

    async fn instantiate_standard(
        &self,
        project: &str,
        lc: &LogicalCloud,
        clusters: &[ClusterReference],
        quotas: &[Quota],
        permissions: &[UserPermission],
    ) -> Result<(), DcmError> {
        let name = lc.name();
        self.clear_certificates(project, name, clusters).await?;

        let bundle = render::render(lc, quotas, permissions, self.config.key_bits).await?;
        debug!(project, logical_cloud = name, resources = bundle.resources().count(), "rendered resources");

        let ctx = AppContext::init(Arc::clone(&self.backends.contexts)).await?;
        if let Err(e) = self.build_standard_context(&ctx, clusters, &bundle).await {
            return Err(self.abandon(&ctx, e).await);
        }

        let key = LogicalCloudKey::new(project, name).to_store_key()?;
        if let Err(e) = insert_value(
            self.backends.store.as_ref(),
            ORCHESTRATOR_COLLECTION,
            &key,
            tags::PRIVATE_KEY,
            &bundle.private_key,
        )
        .await
        {
            return Err(self.abandon(&ctx, e.into()).await);
        }
        if let Err(e) = self.backends.bind(project, name, ctx.id()).await {
            return Err(self.abandon(&ctx, e).await);
        }
        self.install(project, lc, ctx.id()).await
    }

    /// Certificates issued for a previous key pair are useless with a new one
    async fn clear_certificates(&self, project: &str, name: &str, clusters: &[ClusterReference]) -> Result<(), DcmError> {
        for reference in clusters.iter().filter(|r| !r.spec.certificate.is_empty()) {
            let mut cleared = reference.clone();
            cleared.spec.certificate.clear();
            self.clusters
                .update(project, name, reference.name(), cleared)
                .await?;
            debug!(project, logical_cloud = name, cluster = reference.name(), "cleared stale certificate");
        }
        Ok(())
    }

    async fn build_standard_context(
        &self,
        ctx: &AppContext,
        clusters: &[ClusterReference],
        bundle: &ResourceBundle,
    ) -> Result<(), DcmError> {
        let composite = ctx.create_composite_app().await?;
        let app = ctx.add_app(&composite, LOGICAL_CLOUD_APP).await?;
        for reference in clusters {
            let cluster = ctx.add_cluster(&app, &reference.full_name()).await?;
            self.add_bundle(ctx, &cluster, bundle).await?;
        }
        ctx.add_instruction(&composite, InstructionLevel::App, InstructionKind::Order, &app_order())
            .await?;
        ctx.add_instruction(&composite, InstructionLevel::App, InstructionKind::Dependency, &app_dependencies())
            .await?;
        Ok(())
    }

    async fn add_bundle(&self, ctx: &AppContext, cluster: &Handle, bundle: &ResourceBundle) -> Result<(), DcmError> {
        ctx.add_resource(cluster, &bundle.namespace.name, &bundle.namespace.body)
            .await?;
        let csr = ctx
            .add_resource(cluster, &bundle.csr.name, &bundle.csr.body)
            .await?;
        ctx.add_level_value(&csr, &format!("subresource/{}", render::APPROVAL_SUBRESOURCE), &bundle.approval)
            .await?;
        for resource in bundle.roles.iter().chain(&bundle.role_bindings) {
            ctx.add_resource(cluster, &resource.name, &resource.body).await?;
        }
        ctx.add_resource(cluster, &bundle.quota.name, &bundle.quota.body)
            .await?;

        ctx.add_instruction(cluster, InstructionLevel::Resource, InstructionKind::Order, &bundle.order())
            .await?;
        ctx.add_instruction(
            cluster,
            InstructionLevel::Resource,
            InstructionKind::Dependency,
            &bundle.dependencies(),
        )
        .await?;
        ctx.add_instruction(
            &csr,
            InstructionLevel::SubResource,
            InstructionKind::Order,
            &ResourceBundle::subresource_order(),
        )
        .await?;
        ctx.add_instruction(
            &csr,
            InstructionLevel::SubResource,
            InstructionKind::Dependency,
            &ResourceBundle::subresource_dependencies(),
        )
        .await?;
        Ok(())
    }
}
