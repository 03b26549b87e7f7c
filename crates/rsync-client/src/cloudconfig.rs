//! CloudConfig store
//!
//! The synchronizer keeps one kubeconfig per `(provider, cluster, level,
//! namespace)`. Level `"0"` entries hold the cluster admin kubeconfig and
//! the cluster's namespace; level `"1"` entries hold per-logical-cloud
//! user kubeconfigs. Configs are stored base64-encoded.

use crate::error::RsyncError;
use dcm_store::{StoreKey, StoreTrait, find_values, insert_value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Collection holding CloudConfig rows
pub const CLOUDCONFIG_COLLECTION: &str = "cluster";
/// Tag of the CloudConfig value
pub const CLOUDCONFIG_TAG: &str = "cloudconfig";

/// One stored kubeconfig
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Cluster provider
    pub provider: String,
    /// Cluster name
    pub cluster: String,
    /// Logical cloud level, `"0"` or `"1"`
    pub level: String,
    /// Namespace the kubeconfig is scoped to
    pub namespace: String,
    /// Base64-encoded kubeconfig YAML
    pub config: String,
}

/// Trait for CloudConfig store operations
#[async_trait::async_trait]
pub trait CloudConfigTrait: Send + Sync {
    /// Fetch one CloudConfig.
    ///
    /// An empty `namespace` returns the first entry at that level.
    async fn get_cloud_config(
        &self,
        provider: &str,
        cluster: &str,
        level: &str,
        namespace: &str,
    ) -> Result<CloudConfig, RsyncError>;

    /// Namespace recorded for a cluster at level `"0"`
    async fn get_namespace(&self, provider: &str, cluster: &str) -> Result<String, RsyncError>;

    /// Create a CloudConfig; fails with [`RsyncError::CloudConfigExists`] on duplicates
    async fn create_cloud_config(
        &self,
        provider: &str,
        cluster: &str,
        level: &str,
        namespace: &str,
        config: &str,
    ) -> Result<CloudConfig, RsyncError>;

    /// Delete a CloudConfig
    async fn delete_cloud_config(
        &self,
        provider: &str,
        cluster: &str,
        level: &str,
        namespace: &str,
    ) -> Result<(), RsyncError>;
}

/// CloudConfig store backed by the metadata store
#[derive(Clone)]
pub struct StoreCloudConfig {
    store: Arc<dyn StoreTrait>,
}

impl std::fmt::Debug for StoreCloudConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCloudConfig").finish_non_exhaustive()
    }
}

fn cloudconfig_key(provider: &str, cluster: &str, level: &str, namespace: &str) -> StoreKey {
    StoreKey::new()
        .with("provider", provider)
        .with("cluster", cluster)
        .with("level", level)
        .with("namespace", namespace)
}

fn describe(provider: &str, cluster: &str, level: &str, namespace: &str) -> String {
    format!("provider={provider} cluster={cluster} level={level} namespace={namespace}")
}

impl StoreCloudConfig {
    /// Create a CloudConfig store over `store`
    pub fn new(store: Arc<dyn StoreTrait>) -> Self {
        Self { store }
    }

    async fn candidates(
        &self,
        provider: &str,
        cluster: &str,
        level: &str,
        namespace: &str,
    ) -> Result<Vec<CloudConfig>, RsyncError> {
        Ok(find_values(
            self.store.as_ref(),
            CLOUDCONFIG_COLLECTION,
            &cloudconfig_key(provider, cluster, level, namespace),
            CLOUDCONFIG_TAG,
        )
        .await?)
    }
}

#[async_trait::async_trait]
impl CloudConfigTrait for StoreCloudConfig {
    async fn get_cloud_config(
        &self,
        provider: &str,
        cluster: &str,
        level: &str,
        namespace: &str,
    ) -> Result<CloudConfig, RsyncError> {
        let candidates = self.candidates(provider, cluster, level, namespace).await?;
        let exact = candidates.iter().position(|c| c.namespace == namespace);
        let chosen = match exact {
            Some(i) => candidates.into_iter().nth(i),
            None if namespace.is_empty() => candidates.into_iter().next(),
            None => None,
        };
        chosen.ok_or_else(|| RsyncError::CloudConfigNotFound(describe(provider, cluster, level, namespace)))
    }

    async fn get_namespace(&self, provider: &str, cluster: &str) -> Result<String, RsyncError> {
        self.candidates(provider, cluster, "0", "")
            .await?
            .into_iter()
            .next()
            .map(|c| c.namespace)
            .ok_or_else(|| RsyncError::CloudConfigNotFound(describe(provider, cluster, "0", "")))
    }

    async fn create_cloud_config(
        &self,
        provider: &str,
        cluster: &str,
        level: &str,
        namespace: &str,
        config: &str,
    ) -> Result<CloudConfig, RsyncError> {
        let existing = self.candidates(provider, cluster, level, namespace).await?;
        if existing.iter().any(|c| c.namespace == namespace) {
            return Err(RsyncError::CloudConfigExists(describe(provider, cluster, level, namespace)));
        }

        let cloud_config = CloudConfig {
            provider: provider.to_string(),
            cluster: cluster.to_string(),
            level: level.to_string(),
            namespace: namespace.to_string(),
            config: config.to_string(),
        };
        insert_value(
            self.store.as_ref(),
            CLOUDCONFIG_COLLECTION,
            &cloudconfig_key(provider, cluster, level, namespace),
            CLOUDCONFIG_TAG,
            &cloud_config,
        )
        .await?;
        debug!(provider, cluster, level, namespace, "created CloudConfig");
        Ok(cloud_config)
    }

    async fn delete_cloud_config(
        &self,
        provider: &str,
        cluster: &str,
        level: &str,
        namespace: &str,
    ) -> Result<(), RsyncError> {
        self.store
            .remove(CLOUDCONFIG_COLLECTION, &cloudconfig_key(provider, cluster, level, namespace))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    RsyncError::CloudConfigNotFound(describe(provider, cluster, level, namespace))
                } else {
                    RsyncError::Store(e)
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcm_store::MemoryStore;

    fn cloud_configs() -> StoreCloudConfig {
        StoreCloudConfig::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let ccc = cloud_configs();
        ccc.create_cloud_config("cp", "c1", "1", "ns", "YWJj").await.unwrap();

        let got = ccc.get_cloud_config("cp", "c1", "1", "ns").await.unwrap();
        assert_eq!(got.config, "YWJj");

        ccc.delete_cloud_config("cp", "c1", "1", "ns").await.unwrap();
        let err = ccc.get_cloud_config("cp", "c1", "1", "ns").await.unwrap_err();
        assert!(matches!(err, RsyncError::CloudConfigNotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let ccc = cloud_configs();
        ccc.create_cloud_config("cp", "c1", "1", "ns", "a").await.unwrap();
        let err = ccc.create_cloud_config("cp", "c1", "1", "ns", "b").await.unwrap_err();
        assert!(matches!(err, RsyncError::CloudConfigExists(_)));
        // First write wins
        assert_eq!(ccc.get_cloud_config("cp", "c1", "1", "ns").await.unwrap().config, "a");
    }

    #[tokio::test]
    async fn test_level_zero_namespace_lookup() {
        let ccc = cloud_configs();
        ccc.create_cloud_config("cp", "c1", "0", "default", "a").await.unwrap();
        ccc.create_cloud_config("cp", "c2", "0", "kube-system", "b").await.unwrap();

        assert_eq!(ccc.get_namespace("cp", "c1").await.unwrap(), "default");
        assert_eq!(ccc.get_namespace("cp", "c2").await.unwrap(), "kube-system");
        assert!(ccc.get_namespace("cp", "c3").await.is_err());

        // Empty namespace returns the admin entry for the level
        assert_eq!(ccc.get_cloud_config("cp", "c1", "0", "").await.unwrap().config, "a");
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let err = cloud_configs()
            .delete_cloud_config("cp", "c1", "1", "ns")
            .await
            .unwrap_err();
        assert!(matches!(err, RsyncError::CloudConfigNotFound(_)));
    }
}
