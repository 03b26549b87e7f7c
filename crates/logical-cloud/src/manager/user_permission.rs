//! User permissions

use super::{Children, LogicalCloudManager, ProjectManager};
use crate::binding::Backends;
use crate::error::DcmError;
use crate::models::{ChildKind, UserPermission};
use std::sync::Arc;
use tracing::info;

/// Manages RBAC permissions of the Logical Cloud user
#[derive(Debug, Clone)]
pub struct UserPermissionManager {
    backends: Backends,
    projects: ProjectManager,
    logical_clouds: LogicalCloudManager,
}

impl UserPermissionManager {
    /// Creates a user permission manager.
    pub fn new(backends: Backends) -> Self {
        Self {
            projects: ProjectManager::new(Arc::clone(&backends.store)),
            logical_clouds: LogicalCloudManager::new(backends.clone()),
            backends,
        }
    }

    fn children(&self) -> Children<'_> {
        Children::new(self.backends.store.as_ref(), ChildKind::UserPermission)
    }

    /// Grant a permission
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotFound`] for a missing parent and
    /// [`DcmError::AlreadyExists`] for a duplicate.
    pub async fn create(
        &self,
        project: &str,
        logical_cloud: &str,
        permission: UserPermission,
    ) -> Result<UserPermission, DcmError> {
        self.projects.ensure_exists(project).await?;
        self.logical_clouds.get(project, logical_cloud).await?;
        self.children()
            .create(project, logical_cloud, &permission.metadata.name, &permission)
            .await?;
        info!(project, logical_cloud, permission = %permission.metadata.name, "created user permission");
        Ok(permission)
    }

    /// Fetch a permission
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotFound`] when it does not exist.
    pub async fn get(&self, project: &str, logical_cloud: &str, name: &str) -> Result<UserPermission, DcmError> {
        self.children().get(project, logical_cloud, name).await
    }

    /// Every permission of a Logical Cloud
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn get_all(&self, project: &str, logical_cloud: &str) -> Result<Vec<UserPermission>, DcmError> {
        self.children().list(project, logical_cloud).await
    }

    /// Replace a permission. Renames are refused.
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::InvalidInput`] on a name mismatch and
    /// [`DcmError::NotFound`] when it does not exist.
    pub async fn update(
        &self,
        project: &str,
        logical_cloud: &str,
        name: &str,
        permission: UserPermission,
    ) -> Result<UserPermission, DcmError> {
        self.children()
            .update(project, logical_cloud, name, &permission.metadata.name, &permission)
            .await?;
        Ok(permission)
    }

    /// Revoke a permission
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotFound`] when it does not exist.
    pub async fn delete(&self, project: &str, logical_cloud: &str, name: &str) -> Result<(), DcmError> {
        self.children().remove(project, logical_cloud, name).await
    }
}
