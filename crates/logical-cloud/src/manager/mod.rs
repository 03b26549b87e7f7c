//! Configuration managers
//!
//! One manager per record type. Creates check that the parent project and
//! Logical Cloud exist and refuse duplicates; updates refuse renames; deletes
//! of state-sensitive records consult the AppContext binding.

mod cluster;
mod key_value;
mod logical_cloud;
mod project;
mod quota;
mod user_permission;

pub use cluster::ClusterManager;
pub use key_value::KeyValueManager;
pub use logical_cloud::LogicalCloudManager;
pub use project::ProjectManager;
pub use quota::QuotaManager;
pub use user_permission::UserPermissionManager;

use crate::error::DcmError;
use crate::models::{ChildKey, ChildKind, ORCHESTRATOR_COLLECTION, ToStoreKey};
use dcm_store::{StoreTrait, find_value, find_values, insert_value};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Shared persistence of Logical Cloud children
pub(crate) struct Children<'a> {
    store: &'a dyn StoreTrait,
    kind: ChildKind,
}

impl<'a> Children<'a> {
    pub(crate) fn new(store: &'a dyn StoreTrait, kind: ChildKind) -> Self {
        Self { store, kind }
    }

    pub(crate) async fn find<T: DeserializeOwned>(
        &self,
        project: &str,
        logical_cloud: &str,
        name: &str,
    ) -> Result<Option<T>, DcmError> {
        let key = ChildKey::new(self.kind, project, logical_cloud, name).to_store_key()?;
        Ok(find_value(self.store, ORCHESTRATOR_COLLECTION, &key, self.kind.tag()).await?)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        project: &str,
        logical_cloud: &str,
        name: &str,
    ) -> Result<T, DcmError> {
        self.find(project, logical_cloud, name)
            .await?
            .ok_or_else(|| DcmError::NotFound(format!("{} {name}", self.kind.describe())))
    }

    pub(crate) async fn list<T: DeserializeOwned>(
        &self,
        project: &str,
        logical_cloud: &str,
    ) -> Result<Vec<T>, DcmError> {
        let key = ChildKey::new(self.kind, project, logical_cloud, "").to_store_key()?;
        Ok(find_values(self.store, ORCHESTRATOR_COLLECTION, &key, self.kind.tag()).await?)
    }

    pub(crate) async fn put<T: Serialize + Sync>(
        &self,
        project: &str,
        logical_cloud: &str,
        name: &str,
        value: &T,
    ) -> Result<(), DcmError> {
        let key = ChildKey::new(self.kind, project, logical_cloud, name).to_store_key()?;
        insert_value(self.store, ORCHESTRATOR_COLLECTION, &key, self.kind.tag(), value).await?;
        Ok(())
    }

    /// Insert after refusing a duplicate
    pub(crate) async fn create<T: Serialize + DeserializeOwned + Sync>(
        &self,
        project: &str,
        logical_cloud: &str,
        name: &str,
        value: &T,
    ) -> Result<(), DcmError> {
        if name.is_empty() {
            return Err(DcmError::InvalidInput(format!("{} name is required", self.kind.describe())));
        }
        if self.find::<T>(project, logical_cloud, name).await?.is_some() {
            return Err(DcmError::AlreadyExists(format!("{} {name}", self.kind.describe())));
        }
        self.put(project, logical_cloud, name, value).await
    }

    /// Overwrite an existing record; `body_name` must match `name`
    pub(crate) async fn update<T: Serialize + DeserializeOwned + Sync>(
        &self,
        project: &str,
        logical_cloud: &str,
        name: &str,
        body_name: &str,
        value: &T,
    ) -> Result<(), DcmError> {
        if body_name != name {
            return Err(DcmError::InvalidInput(format!(
                "{} name mismatch: {body_name} != {name}",
                self.kind.describe()
            )));
        }
        self.get::<T>(project, logical_cloud, name).await?;
        self.put(project, logical_cloud, name, value).await
    }

    pub(crate) async fn remove(
        &self,
        project: &str,
        logical_cloud: &str,
        name: &str,
    ) -> Result<(), DcmError> {
        let key = ChildKey::new(self.kind, project, logical_cloud, name).to_store_key()?;
        self.store
            .remove(ORCHESTRATOR_COLLECTION, &key)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    DcmError::NotFound(format!("{} {name}", self.kind.describe()))
                } else {
                    e.into()
                }
            })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::binding::Backends;
    use crate::models::{LogicalCloud, LogicalCloudSpec, Metadata, UserData};
    use appcontext::MemoryContextStore;
    use dcm_store::MemoryStore;
    use std::sync::Arc;

    pub(crate) fn backends() -> (MemoryStore, MemoryContextStore, Backends) {
        let store = MemoryStore::new();
        let contexts = MemoryContextStore::new();
        let backends = Backends::new(Arc::new(store.clone()), Arc::new(contexts.clone()));
        (store, contexts, backends)
    }

    pub(crate) fn logical_cloud(name: &str, level: &str) -> LogicalCloud {
        LogicalCloud {
            metadata: Metadata::named(name),
            spec: LogicalCloudSpec {
                namespace: "testns".to_string(),
                level: level.to_string(),
                user: UserData {
                    user_name: "lcuser".to_string(),
                    user_type: "certificate".to_string(),
                    user_permissions: Vec::new(),
                },
            },
        }
    }
}
