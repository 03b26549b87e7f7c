//! Logical Cloud records

use super::{Children, ProjectManager};
use crate::binding::{Backends, Binding};
use crate::error::{ConflictReason, DcmError};
use crate::models::{
    ChildKind, LEVEL_ADMIN, LEVEL_STANDARD, LogicalCloud, LogicalCloudKey, ORCHESTRATOR_COLLECTION,
    ToStoreKey, tags,
};
use appcontext::AppContextStatus;
use dcm_store::{find_value, find_values, insert_value};
use tracing::{error, info, warn};

/// Manages Logical Cloud definitions
#[derive(Debug, Clone)]
pub struct LogicalCloudManager {
    backends: Backends,
    projects: ProjectManager,
}

fn validate(lc: &mut LogicalCloud) -> Result<(), DcmError> {
    if lc.metadata.name.is_empty() {
        return Err(DcmError::InvalidInput("Logical Cloud name is required".to_string()));
    }
    if lc.spec.level.is_empty() {
        lc.spec.level = LEVEL_STANDARD.to_string();
    }
    if lc.spec.level != LEVEL_ADMIN && lc.spec.level != LEVEL_STANDARD {
        return Err(DcmError::InvalidInput(format!(
            "Logical Cloud level must be 0 or 1, got {}",
            lc.spec.level
        )));
    }
    if lc.spec.level == LEVEL_STANDARD && lc.spec.namespace.is_empty() {
        return Err(DcmError::InvalidInput(format!(
            "Logical Cloud {} is Level-1 and needs a namespace",
            lc.metadata.name
        )));
    }
    Ok(())
}

impl LogicalCloudManager {
    /// Creates a Logical Cloud manager.
    pub fn new(backends: Backends) -> Self {
        let projects = ProjectManager::new(std::sync::Arc::clone(&backends.store));
        Self { backends, projects }
    }

    async fn find(&self, project: &str, name: &str) -> Result<Option<LogicalCloud>, DcmError> {
        let key = LogicalCloudKey::new(project, name).to_store_key()?;
        Ok(find_value(
            self.backends.store.as_ref(),
            ORCHESTRATOR_COLLECTION,
            &key,
            tags::LOGICAL_CLOUD,
        )
        .await?)
    }

    async fn put(&self, project: &str, lc: &LogicalCloud) -> Result<(), DcmError> {
        let key = LogicalCloudKey::new(project, lc.name()).to_store_key()?;
        insert_value(
            self.backends.store.as_ref(),
            ORCHESTRATOR_COLLECTION,
            &key,
            tags::LOGICAL_CLOUD,
            lc,
        )
        .await?;
        Ok(())
    }

    /// Create a Logical Cloud. An empty level defaults to `"1"`.
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotFound`] for an unknown project,
    /// [`DcmError::AlreadyExists`] for a duplicate and
    /// [`DcmError::InvalidInput`] for an unknown level.
    pub async fn create(&self, project: &str, mut lc: LogicalCloud) -> Result<LogicalCloud, DcmError> {
        self.projects.ensure_exists(project).await?;
        validate(&mut lc)?;
        if self.find(project, lc.name()).await?.is_some() {
            return Err(DcmError::AlreadyExists(format!("Logical Cloud {}", lc.name())));
        }
        self.put(project, &lc).await?;
        info!(project, logical_cloud = lc.name(), level = %lc.spec.level, "created Logical Cloud");
        Ok(lc)
    }

    /// Fetch a Logical Cloud
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotFound`] when it does not exist.
    pub async fn get(&self, project: &str, name: &str) -> Result<LogicalCloud, DcmError> {
        self.find(project, name)
            .await?
            .ok_or_else(|| DcmError::NotFound(format!("Logical Cloud {name}")))
    }

    /// Every Logical Cloud of a project
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn get_all(&self, project: &str) -> Result<Vec<LogicalCloud>, DcmError> {
        let key = LogicalCloudKey::new(project, "").to_store_key()?;
        Ok(find_values(
            self.backends.store.as_ref(),
            ORCHESTRATOR_COLLECTION,
            &key,
            tags::LOGICAL_CLOUD,
        )
        .await?)
    }

    /// Replace a Logical Cloud definition. Renames are refused.
    ///
    /// Level and namespace only change while no live AppContext is bound,
    /// and a cloud holding quotas can't become Level-0.
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::InvalidInput`] on a name mismatch or a Level-0
    /// switch with quotas, [`DcmError::NotFound`] when the cloud does not
    /// exist and [`DcmError::Conflict`] for a placement change while
    /// instantiated.
    pub async fn update(
        &self,
        project: &str,
        name: &str,
        mut lc: LogicalCloud,
    ) -> Result<LogicalCloud, DcmError> {
        if lc.name() != name {
            return Err(DcmError::InvalidInput(format!(
                "Logical Cloud name mismatch: {} != {name}",
                lc.name()
            )));
        }
        validate(&mut lc)?;
        let current = self.get(project, name).await?;

        if lc.is_admin_level() && !current.is_admin_level() {
            let quotas: Vec<serde_json::Value> =
                Children::new(self.backends.store.as_ref(), ChildKind::Quota).list(project, name).await?;
            if !quotas.is_empty() {
                return Err(DcmError::InvalidInput(format!(
                    "Logical Cloud {name} has Cluster Quotas and can't become Level-0"
                )));
            }
        }

        if lc.spec.level != current.spec.level || lc.spec.namespace != current.spec.namespace {
            let binding = self.backends.binding(project, name).await?;
            if let Some(reason) = binding.placement_conflict() {
                warn!(project, logical_cloud = name, %reason, "refusing to change level or namespace");
                return Err(DcmError::conflict(reason));
            }
        }

        self.put(project, &lc).await?;
        info!(project, logical_cloud = name, "updated Logical Cloud");
        Ok(lc)
    }

    /// Persist a definition mutated by the lifecycle engine
    pub(crate) async fn store(&self, project: &str, lc: &LogicalCloud) -> Result<(), DcmError> {
        self.put(project, lc).await
    }

    async fn has_children(&self, project: &str, name: &str) -> Result<bool, DcmError> {
        let store = self.backends.store.as_ref();
        for kind in [
            ChildKind::ClusterReference,
            ChildKind::Quota,
            ChildKind::UserPermission,
            ChildKind::KeyValue,
        ] {
            let children: Vec<serde_json::Value> = Children::new(store, kind).list(project, name).await?;
            if !children.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Delete a Logical Cloud.
    ///
    /// Allowed when no AppContext is bound, or the bound one is
    /// `Terminated` or `TerminateFailed` (or never accepted by the
    /// synchronizer). The AppContext is removed before the record.
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::Conflict`] when the AppContext state or remaining
    /// child records forbid the delete.
    pub async fn delete(&self, project: &str, name: &str) -> Result<(), DcmError> {
        self.get(project, name).await?;
        if self.has_children(project, name).await? {
            return Err(DcmError::conflict(ConflictReason::HasChildren));
        }

        let key = LogicalCloudKey::new(project, name).to_store_key()?;
        let ctx = match self.backends.binding(project, name).await? {
            Binding::Unbound => None,
            Binding::Pending(ctx)
            | Binding::Bound(ctx, AppContextStatus::Terminated | AppContextStatus::TerminateFailed) => {
                Some(ctx)
            }
            Binding::Bound(_, status) => {
                error!(project, logical_cloud = name, %status, "Logical Cloud can't be deleted in this state");
                return Err(DcmError::conflict(delete_conflict(status)));
            }
        };

        if let Some(ctx) = ctx {
            ctx.delete_composite_app().await?;
            self.backends.unbind(project, name, ctx.id()).await?;
        }
        self.backends
            .store
            .remove(ORCHESTRATOR_COLLECTION, &key)
            .await?;
        info!(project, logical_cloud = name, "deleted Logical Cloud");
        Ok(())
    }
}

fn delete_conflict(status: AppContextStatus) -> ConflictReason {
    match status {
        AppContextStatus::Terminating => ConflictReason::BeingTerminated,
        AppContextStatus::InstantiateFailed => ConflictReason::MustTerminateFirst,
        AppContextStatus::Instantiated | AppContextStatus::Instantiating => {
            ConflictReason::ContextActive(status.to_string())
        }
        other => ConflictReason::UnexpectedStatus(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::fixtures;
    use appcontext::AppContext;
    use std::sync::Arc;

    async fn manager() -> (dcm_store::MemoryStore, appcontext::MemoryContextStore, LogicalCloudManager) {
        let (store, contexts, backends) = fixtures::backends();
        ProjectManager::new(std::sync::Arc::clone(&backends.store)).create("p").await.unwrap();
        (store, contexts, LogicalCloudManager::new(backends))
    }

    #[tokio::test]
    async fn test_create_get_list_delete() {
        let (_, _, manager) = manager().await;
        let created = manager.create("p", fixtures::logical_cloud("lc", "")).await.unwrap();
        assert_eq!(created.spec.level, "1");

        assert_eq!(manager.get("p", "lc").await.unwrap(), created);
        assert_eq!(manager.get_all("p").await.unwrap(), vec![created]);

        manager.delete("p", "lc").await.unwrap();
        assert!(matches!(manager.get("p", "lc").await, Err(DcmError::NotFound(_))));
        assert!(manager.get_all("p").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_create_keeps_original() {
        let (_, _, manager) = manager().await;
        manager.create("p", fixtures::logical_cloud("lc", "1")).await.unwrap();

        let mut other = fixtures::logical_cloud("lc", "1");
        other.spec.namespace = "other".to_string();
        assert!(matches!(manager.create("p", other).await, Err(DcmError::AlreadyExists(_))));
        assert_eq!(manager.get("p", "lc").await.unwrap().spec.namespace, "testns");
    }

    #[tokio::test]
    async fn test_unknown_project_and_level_rejected() {
        let (_, _, manager) = manager().await;
        assert!(matches!(
            manager.create("nope", fixtures::logical_cloud("lc", "1")).await,
            Err(DcmError::NotFound(_))
        ));
        assert!(matches!(
            manager.create("p", fixtures::logical_cloud("lc", "2")).await,
            Err(DcmError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_update_refuses_rename() {
        let (_, _, manager) = manager().await;
        manager.create("p", fixtures::logical_cloud("lc", "1")).await.unwrap();
        let renamed = fixtures::logical_cloud("other", "1");
        assert!(matches!(
            manager.update("p", "lc", renamed).await,
            Err(DcmError::InvalidInput(_))
        ));

        let mut changed = fixtures::logical_cloud("lc", "1");
        changed.metadata.description = "updated".to_string();
        manager.update("p", "lc", changed).await.unwrap();
        assert_eq!(manager.get("p", "lc").await.unwrap().metadata.description, "updated");
    }

    #[tokio::test]
    async fn test_level_one_requires_namespace() {
        let (_, _, manager) = manager().await;
        let mut lc = fixtures::logical_cloud("lc", "1");
        lc.spec.namespace = String::new();
        assert!(matches!(manager.create("p", lc.clone()).await, Err(DcmError::InvalidInput(_))));

        lc.spec.level = "0".to_string();
        manager.create("p", lc).await.unwrap();

        let mut promoted = fixtures::logical_cloud("lc", "1");
        promoted.spec.namespace = String::new();
        assert!(matches!(
            manager.update("p", "lc", promoted).await,
            Err(DcmError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_update_to_level_zero_refused_with_quotas() {
        let (store, _, manager) = manager().await;
        manager.create("p", fixtures::logical_cloud("lc", "1")).await.unwrap();
        let quotas = Children::new(&store, ChildKind::Quota);
        quotas
            .put("p", "lc", "q1", &serde_json::json!({"metadata": {"name": "q1"}, "spec": {"limits.cpu": "4"}}))
            .await
            .unwrap();

        let err = manager
            .update("p", "lc", fixtures::logical_cloud("lc", "0"))
            .await
            .unwrap_err();
        assert!(matches!(err, DcmError::InvalidInput(_)));
        assert_eq!(manager.get("p", "lc").await.unwrap().spec.level, "1");

        quotas.remove("p", "lc", "q1").await.unwrap();
        manager.update("p", "lc", fixtures::logical_cloud("lc", "0")).await.unwrap();
        assert!(manager.get("p", "lc").await.unwrap().is_admin_level());
    }

    #[tokio::test]
    async fn test_update_placement_frozen_while_instantiated() {
        let (_, contexts, manager) = manager().await;
        manager.create("p", fixtures::logical_cloud("lc", "1")).await.unwrap();

        let ctx = AppContext::init(Arc::new(contexts)).await.unwrap();
        ctx.create_composite_app().await.unwrap();
        ctx.set_status(&AppContextStatus::Instantiated).await.unwrap();
        manager.backends.bind("p", "lc", ctx.id()).await.unwrap();

        let mut moved = fixtures::logical_cloud("lc", "1");
        moved.spec.namespace = "otherns".to_string();
        let err = manager.update("p", "lc", moved.clone()).await.unwrap_err();
        assert!(matches!(
            err.conflict_reason(),
            Some(ConflictReason::ContextActive(_))
        ));
        assert_eq!(manager.get("p", "lc").await.unwrap().spec.namespace, "testns");

        let mut described = fixtures::logical_cloud("lc", "1");
        described.metadata.description = "still here".to_string();
        manager.update("p", "lc", described).await.unwrap();

        ctx.set_status(&AppContextStatus::Terminated).await.unwrap();
        manager.update("p", "lc", moved).await.unwrap();
        assert_eq!(manager.get("p", "lc").await.unwrap().spec.namespace, "otherns");
    }

    #[tokio::test]
    async fn test_delete_blocked_while_instantiated() {
        let (_, contexts, manager) = manager().await;
        manager.create("p", fixtures::logical_cloud("lc", "1")).await.unwrap();

        let ctx = AppContext::init(Arc::new(contexts.clone())).await.unwrap();
        ctx.create_composite_app().await.unwrap();
        ctx.set_status(&AppContextStatus::Instantiated).await.unwrap();
        manager.backends.bind("p", "lc", ctx.id()).await.unwrap();

        let err = manager.delete("p", "lc").await.unwrap_err();
        assert!(matches!(
            err.conflict_reason(),
            Some(ConflictReason::ContextActive(_))
        ));

        ctx.set_status(&AppContextStatus::Terminated).await.unwrap();
        manager.delete("p", "lc").await.unwrap();
        assert!(contexts.is_empty());
        assert!(matches!(manager.backends.resolve(ctx.id()).await, Err(DcmError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_with_children_is_conflict() {
        let (store, _, manager) = manager().await;
        manager.create("p", fixtures::logical_cloud("lc", "1")).await.unwrap();
        Children::new(&store, ChildKind::KeyValue)
            .put("p", "lc", "kv1", &serde_json::json!({"metadata": {"name": "kv1"}}))
            .await
            .unwrap();

        let err = manager.delete("p", "lc").await.unwrap_err();
        assert_eq!(err.conflict_reason(), Some(&ConflictReason::HasChildren));
        manager.get("p", "lc").await.unwrap();
    }
}
