//! Key/value pairs
//!
//! Free-form annotations; independent of the AppContext state.

use super::{Children, LogicalCloudManager, ProjectManager};
use crate::binding::Backends;
use crate::error::DcmError;
use crate::models::{ChildKind, KeyValue};
use std::sync::Arc;

/// Manages key/value pairs of Logical Clouds
#[derive(Debug, Clone)]
pub struct KeyValueManager {
    backends: Backends,
    projects: ProjectManager,
    logical_clouds: LogicalCloudManager,
}

impl KeyValueManager {
    /// Creates a key/value manager.
    pub fn new(backends: Backends) -> Self {
        Self {
            projects: ProjectManager::new(Arc::clone(&backends.store)),
            logical_clouds: LogicalCloudManager::new(backends.clone()),
            backends,
        }
    }

    fn children(&self) -> Children<'_> {
        Children::new(self.backends.store.as_ref(), ChildKind::KeyValue)
    }

    /// Create a key/value pair
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotFound`] for a missing parent and
    /// [`DcmError::AlreadyExists`] for a duplicate.
    pub async fn create(&self, project: &str, logical_cloud: &str, kv: KeyValue) -> Result<KeyValue, DcmError> {
        self.projects.ensure_exists(project).await?;
        self.logical_clouds.get(project, logical_cloud).await?;
        self.children()
            .create(project, logical_cloud, &kv.metadata.name, &kv)
            .await?;
        Ok(kv)
    }

    /// Fetch a key/value pair
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotFound`] when it does not exist.
    pub async fn get(&self, project: &str, logical_cloud: &str, name: &str) -> Result<KeyValue, DcmError> {
        self.children().get(project, logical_cloud, name).await
    }

    /// Every key/value pair of a Logical Cloud
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn get_all(&self, project: &str, logical_cloud: &str) -> Result<Vec<KeyValue>, DcmError> {
        self.children().list(project, logical_cloud).await
    }

    /// Replace a key/value pair. Renames are refused.
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::InvalidInput`] on a name mismatch and
    /// [`DcmError::NotFound`] when it does not exist.
    pub async fn update(&self, project: &str, logical_cloud: &str, name: &str, kv: KeyValue) -> Result<KeyValue, DcmError> {
        self.children()
            .update(project, logical_cloud, name, &kv.metadata.name, &kv)
            .await?;
        Ok(kv)
    }

    /// Delete a key/value pair
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotFound`] when it does not exist.
    pub async fn delete(&self, project: &str, logical_cloud: &str, name: &str) -> Result<(), DcmError> {
        self.children().remove(project, logical_cloud, name).await
    }
}
