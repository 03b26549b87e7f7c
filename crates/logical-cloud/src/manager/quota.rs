//! Cluster quotas
//!
//! A level-0 Logical Cloud reuses an existing namespace and never carries a
//! quota.

use super::{Children, LogicalCloudManager, ProjectManager};
use crate::binding::Backends;
use crate::error::DcmError;
use crate::models::{ChildKind, Quota};
use std::sync::Arc;
use tracing::info;

/// Manages quotas of Logical Clouds
#[derive(Debug, Clone)]
pub struct QuotaManager {
    backends: Backends,
    projects: ProjectManager,
    logical_clouds: LogicalCloudManager,
}

impl QuotaManager {
    /// Creates a quota manager.
    pub fn new(backends: Backends) -> Self {
        Self {
            projects: ProjectManager::new(Arc::clone(&backends.store)),
            logical_clouds: LogicalCloudManager::new(backends.clone()),
            backends,
        }
    }

    fn children(&self) -> Children<'_> {
        Children::new(self.backends.store.as_ref(), ChildKind::Quota)
    }

    /// Attach a quota
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::InvalidInput`] for a level-0 Logical Cloud and
    /// [`DcmError::AlreadyExists`] for a duplicate.
    pub async fn create(&self, project: &str, logical_cloud: &str, quota: Quota) -> Result<Quota, DcmError> {
        self.projects.ensure_exists(project).await?;
        let lc = self.logical_clouds.get(project, logical_cloud).await?;
        if lc.is_admin_level() {
            return Err(DcmError::InvalidInput(
                "Cluster Quotas not allowed for Logical Cloud Level 0".to_string(),
            ));
        }
        self.children()
            .create(project, logical_cloud, &quota.metadata.name, &quota)
            .await?;
        info!(project, logical_cloud, quota = %quota.metadata.name, "created quota");
        Ok(quota)
    }

    /// Fetch a quota
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotFound`] when it does not exist.
    pub async fn get(&self, project: &str, logical_cloud: &str, name: &str) -> Result<Quota, DcmError> {
        self.children().get(project, logical_cloud, name).await
    }

    /// Every quota of a Logical Cloud
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn get_all(&self, project: &str, logical_cloud: &str) -> Result<Vec<Quota>, DcmError> {
        self.children().list(project, logical_cloud).await
    }

    /// Replace a quota. Renames are refused.
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::InvalidInput`] on a name mismatch and
    /// [`DcmError::NotFound`] when it does not exist.
    pub async fn update(&self, project: &str, logical_cloud: &str, name: &str, quota: Quota) -> Result<Quota, DcmError> {
        self.children()
            .update(project, logical_cloud, name, &quota.metadata.name, &quota)
            .await?;
        Ok(quota)
    }

    /// Remove a quota
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotFound`] when it does not exist.
    pub async fn delete(&self, project: &str, logical_cloud: &str, name: &str) -> Result<(), DcmError> {
        self.children().remove(project, logical_cloud, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::fixtures;
    use crate::models::Metadata;
    use std::collections::BTreeMap;

    fn quota(name: &str) -> Quota {
        Quota {
            metadata: Metadata::named(name),
            spec: BTreeMap::from([
                ("limits.cpu".to_string(), "4".to_string()),
                ("limits.memory".to_string(), "4096".to_string()),
            ]),
        }
    }

    async fn setup(level: &str) -> QuotaManager {
        let (_, _, backends) = fixtures::backends();
        ProjectManager::new(Arc::clone(&backends.store)).create("p").await.unwrap();
        LogicalCloudManager::new(backends.clone())
            .create("p", fixtures::logical_cloud("lc", level))
            .await
            .unwrap();
        QuotaManager::new(backends)
    }

    #[tokio::test]
    async fn test_crud() {
        let quotas = setup("1").await;
        let created = quotas.create("p", "lc", quota("q1")).await.unwrap();
        assert_eq!(quotas.get("p", "lc", "q1").await.unwrap(), created);
        assert!(matches!(
            quotas.create("p", "lc", quota("q1")).await,
            Err(DcmError::AlreadyExists(_))
        ));
        assert!(matches!(
            quotas.update("p", "lc", "q1", quota("q2")).await,
            Err(DcmError::InvalidInput(_))
        ));

        quotas.delete("p", "lc", "q1").await.unwrap();
        assert!(quotas.get_all("p", "lc").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_level_zero_rejects_quota() {
        let quotas = setup("0").await;
        let err = quotas.create("p", "lc", quota("q1")).await.unwrap_err();
        assert!(matches!(err, DcmError::InvalidInput(_)));
        assert!(quotas.get_all("p", "lc").await.unwrap().is_empty());
    }
}
