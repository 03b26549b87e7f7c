//! Project lookups
//!
//! Projects are owned by the orchestrator; Logical Cloud operations only need
//! to know that one exists. Creation is exposed so a standalone deployment
//! and tests can seed projects.

use crate::error::DcmError;
use crate::models::{Metadata, ORCHESTRATOR_COLLECTION, Project, ProjectKey, ToStoreKey, tags};
use dcm_store::{StoreTrait, find_value, insert_value};
use std::sync::Arc;
use tracing::info;

/// Reads and seeds project records
#[derive(Clone)]
pub struct ProjectManager {
    store: Arc<dyn StoreTrait>,
}

impl std::fmt::Debug for ProjectManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectManager").finish_non_exhaustive()
    }
}

impl ProjectManager {
    /// Creates a project manager over the metadata store.
    pub fn new(store: Arc<dyn StoreTrait>) -> Self {
        Self { store }
    }

    /// Create a project
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::AlreadyExists`] for a duplicate name.
    pub async fn create(&self, name: &str) -> Result<Project, DcmError> {
        if name.is_empty() {
            return Err(DcmError::InvalidInput("Project name is required".to_string()));
        }
        if self.find(name).await?.is_some() {
            return Err(DcmError::AlreadyExists(format!("Project {name}")));
        }
        let project = Project {
            metadata: Metadata::named(name),
        };
        let key = ProjectKey { project: name }.to_store_key()?;
        insert_value(self.store.as_ref(), ORCHESTRATOR_COLLECTION, &key, tags::PROJECT, &project).await?;
        info!(project = name, "created project");
        Ok(project)
    }

    async fn find(&self, name: &str) -> Result<Option<Project>, DcmError> {
        let key = ProjectKey { project: name }.to_store_key()?;
        Ok(find_value(self.store.as_ref(), ORCHESTRATOR_COLLECTION, &key, tags::PROJECT).await?)
    }

    /// Fetch a project
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotFound`] when it does not exist.
    pub async fn get(&self, name: &str) -> Result<Project, DcmError> {
        self.find(name)
            .await?
            .ok_or_else(|| DcmError::NotFound(format!("Project {name}")))
    }

    /// Fail unless the project exists
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotFound`] when it does not exist.
    pub async fn ensure_exists(&self, name: &str) -> Result<(), DcmError> {
        self.get(name).await.map(|_| ())
    }
}
