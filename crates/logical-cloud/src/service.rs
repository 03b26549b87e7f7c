//! Logical Cloud service
//!
//! Single entry point over the managers, the lifecycle engine and the
//! kubeconfig assembler, addressed by `(project, logical cloud, child)`.

use crate::binding::Backends;
use crate::error::DcmError;
use crate::lifecycle::{EngineConfig, LifecycleEngine};
use crate::manager::{
    ClusterManager, KeyValueManager, LogicalCloudManager, ProjectManager, QuotaManager,
    UserPermissionManager,
};
use rsync_client::{CloudConfigTrait, RsyncClientTrait};
use std::sync::Arc;
use tracing::info;

/// Logical Cloud service
#[derive(Debug, Clone)]
pub struct DcmService {
    projects: ProjectManager,
    logical_clouds: LogicalCloudManager,
    clusters: ClusterManager,
    quotas: QuotaManager,
    user_permissions: UserPermissionManager,
    key_values: KeyValueManager,
    engine: LifecycleEngine,
}

impl DcmService {
    /// Creates the service over the given stores and synchronizer client.
    pub fn new(
        backends: Backends,
        rsync: Arc<dyn RsyncClientTrait>,
        cloud_configs: Arc<dyn CloudConfigTrait>,
        config: EngineConfig,
    ) -> Self {
        Self {
            projects: ProjectManager::new(Arc::clone(&backends.store)),
            logical_clouds: LogicalCloudManager::new(backends.clone()),
            clusters: ClusterManager::new(backends.clone()),
            quotas: QuotaManager::new(backends.clone()),
            user_permissions: UserPermissionManager::new(backends.clone()),
            key_values: KeyValueManager::new(backends.clone()),
            engine: LifecycleEngine::new(backends, rsync, cloud_configs, config),
        }
    }

    /// Projects
    #[must_use]
    pub fn projects(&self) -> &ProjectManager {
        &self.projects
    }

    /// Logical Cloud definitions
    #[must_use]
    pub fn logical_clouds(&self) -> &LogicalCloudManager {
        &self.logical_clouds
    }

    /// Cluster references
    #[must_use]
    pub fn clusters(&self) -> &ClusterManager {
        &self.clusters
    }

    /// Cluster quotas
    #[must_use]
    pub fn quotas(&self) -> &QuotaManager {
        &self.quotas
    }

    /// User permissions
    #[must_use]
    pub fn user_permissions(&self) -> &UserPermissionManager {
        &self.user_permissions
    }

    /// Key/value pairs
    #[must_use]
    pub fn key_values(&self) -> &KeyValueManager {
        &self.key_values
    }

    /// Lifecycle engine
    #[must_use]
    pub fn engine(&self) -> &LifecycleEngine {
        &self.engine
    }

    /// Delete a Logical Cloud. One whose termination failed is uninstalled
    /// once more, best effort, before its AppContext is dropped.
    ///
    /// # Errors
    ///
    /// See [`LogicalCloudManager::delete`].
    pub async fn delete_logical_cloud(&self, project: &str, name: &str) -> Result<(), DcmError> {
        self.logical_clouds.get(project, name).await?;
        self.engine.uninstall_failed_termination(project, name).await?;
        self.logical_clouds.delete(project, name).await
    }

    /// Instantiate a Logical Cloud with its current references, quotas and
    /// permissions
    ///
    /// # Errors
    ///
    /// See [`LifecycleEngine::instantiate`].
    pub async fn instantiate(&self, project: &str, name: &str) -> Result<(), DcmError> {
        let lc = self.logical_clouds.get(project, name).await?;
        let clusters = self.clusters.get_all(project, name).await?;
        let quotas = self.quotas.get_all(project, name).await?;
        let permissions = self.user_permissions.get_all(project, name).await?;
        info!(
            project,
            logical_cloud = name,
            clusters = clusters.len(),
            quotas = quotas.len(),
            user_permissions = permissions.len(),
            "instantiating Logical Cloud"
        );
        self.engine
            .instantiate(project, &lc, &clusters, &quotas, &permissions)
            .await
    }

    /// Terminate a Logical Cloud
    ///
    /// # Errors
    ///
    /// See [`LifecycleEngine::terminate`].
    pub async fn terminate(&self, project: &str, name: &str) -> Result<(), DcmError> {
        let lc = self.logical_clouds.get(project, name).await?;
        let clusters = self.clusters.get_all(project, name).await?;
        info!(project, logical_cloud = name, "terminating Logical Cloud");
        self.engine.terminate(project, &lc, &clusters).await
    }

    /// Stop a Logical Cloud transition
    ///
    /// # Errors
    ///
    /// See [`LifecycleEngine::stop`].
    pub async fn stop(&self, project: &str, name: &str) -> Result<(), DcmError> {
        self.logical_clouds.get(project, name).await?;
        self.engine.stop(project, name).await
    }

    /// User kubeconfig for one cluster reference
    ///
    /// # Errors
    ///
    /// See [`crate::KubeconfigAssembler::get_cluster_config`].
    pub async fn get_cluster_config(
        &self,
        project: &str,
        name: &str,
        cluster_ref: &str,
    ) -> Result<String, DcmError> {
        self.engine
            .kubeconfigs()
            .get_cluster_config(project, name, cluster_ref)
            .await
    }

    /// Cancel and join every readiness task
    pub async fn shutdown(&self) {
        self.engine.supervisor().shutdown().await;
    }
}
