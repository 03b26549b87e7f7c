//! Cluster references
//!
//! Membership can only change while the Logical Cloud has no live
//! AppContext: either none is bound or the bound one is `Terminated`.

use super::{Children, LogicalCloudManager, ProjectManager};
use crate::binding::Backends;
use crate::error::DcmError;
use crate::models::{ChildKind, ClusterReference};
use std::sync::Arc;
use tracing::{info, warn};

/// Manages cluster references of Logical Clouds
#[derive(Debug, Clone)]
pub struct ClusterManager {
    backends: Backends,
    projects: ProjectManager,
    logical_clouds: LogicalCloudManager,
}

impl ClusterManager {
    /// Creates a cluster reference manager.
    pub fn new(backends: Backends) -> Self {
        Self {
            projects: ProjectManager::new(Arc::clone(&backends.store)),
            logical_clouds: LogicalCloudManager::new(backends.clone()),
            backends,
        }
    }

    fn children(&self) -> Children<'_> {
        Children::new(self.backends.store.as_ref(), ChildKind::ClusterReference)
    }

    async fn ensure_membership_mutable(&self, project: &str, logical_cloud: &str) -> Result<(), DcmError> {
        let Some(reason) = self.backends.binding(project, logical_cloud).await?.placement_conflict() else {
            return Ok(());
        };
        warn!(
            project,
            logical_cloud,
            %reason,
            "Cluster References cannot be added or removed unless the Logical Cloud is not instantiated"
        );
        Err(DcmError::conflict(reason))
    }

    /// Add a cluster to a Logical Cloud
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotFound`] for a missing parent,
    /// [`DcmError::Conflict`] while an AppContext is live and
    /// [`DcmError::AlreadyExists`] for a duplicate.
    pub async fn create(
        &self,
        project: &str,
        logical_cloud: &str,
        reference: ClusterReference,
    ) -> Result<ClusterReference, DcmError> {
        self.projects.ensure_exists(project).await?;
        self.logical_clouds.get(project, logical_cloud).await?;
        self.ensure_membership_mutable(project, logical_cloud).await?;
        self.children()
            .create(project, logical_cloud, reference.name(), &reference)
            .await?;
        info!(project, logical_cloud, cluster = reference.name(), "added cluster reference");
        Ok(reference)
    }

    /// Fetch a cluster reference
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotFound`] when it does not exist.
    pub async fn get(&self, project: &str, logical_cloud: &str, name: &str) -> Result<ClusterReference, DcmError> {
        self.children().get(project, logical_cloud, name).await
    }

    /// Every cluster reference of a Logical Cloud, in insertion order of
    /// their keys
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn get_all(&self, project: &str, logical_cloud: &str) -> Result<Vec<ClusterReference>, DcmError> {
        self.children().list(project, logical_cloud).await
    }

    /// Replace a cluster reference. Renames are refused.
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
        reference: ClusterReference,
    ) -> Result<ClusterReference, DcmError> {
        self.children()
            .update(project, logical_cloud, name, reference.name(), &reference)
            .await?;
        Ok(reference)
    }

    /// Remove a cluster from a Logical Cloud
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::Conflict`] unless the Logical Cloud is unbound or
    /// terminated, and [`DcmError::NotFound`] when the reference is absent.
    pub async fn delete(&self, project: &str, logical_cloud: &str, name: &str) -> Result<(), DcmError> {
        self.ensure_membership_mutable(project, logical_cloud).await?;
        self.children().remove(project, logical_cloud, name).await?;
        info!(project, logical_cloud, cluster = name, "removed cluster reference");
        Ok(())
    }
}
