//! Binding between a Logical Cloud and its AppContext
//!
//! A Logical Cloud row carries the id of its current AppContext under the
//! `lccontext` tag. An inverse row keyed by that id points back at the cloud
//! so readiness notifications can be routed. Both rows are written in one
//! batch.

use crate::error::{ConflictReason, DcmError};
use crate::models::{
    AppContextKey, LogicalCloudKey, ORCHESTRATOR_COLLECTION, ToStoreKey, tags,
};
use appcontext::{AppContext, AppContextError, AppContextStatus, ContextStoreTrait};
use dcm_store::{StoreEntry, StoreTrait, find_value, marshal};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Stores every Logical Cloud operation reads and writes
#[derive(Clone)]
pub struct Backends {
    /// Metadata store
    pub store: Arc<dyn StoreTrait>,
    /// AppContext store
    pub contexts: Arc<dyn ContextStoreTrait>,
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

/// State of the AppContext attached to a Logical Cloud
#[derive(Debug, Clone)]
pub enum Binding {
    /// No AppContext was ever bound, or it was released
    Unbound,
    /// An AppContext is bound but the synchronizer never wrote a status,
    /// i.e. install was not accepted yet
    Pending(AppContext),
    /// An AppContext is bound and carries a lifecycle status
    Bound(AppContext, AppContextStatus),
}

impl Binding {
    /// Bound AppContext, if any
    #[must_use]
    pub fn context(&self) -> Option<&AppContext> {
        match self {
            Binding::Unbound => None,
            Binding::Pending(ctx) | Binding::Bound(ctx, _) => Some(ctx),
        }
    }

    /// Lifecycle status, if one was written
    #[must_use]
    pub fn status(&self) -> Option<&AppContextStatus> {
        match self {
            Binding::Bound(_, status) => Some(status),
            _ => None,
        }
    }

    /// Why the cloud's placement (clusters, level, namespace) can't change
    /// now; `None` when unbound or `Terminated`
    #[must_use]
    pub fn placement_conflict(&self) -> Option<ConflictReason> {
        let reason = match self {
            Binding::Unbound | Binding::Bound(_, AppContextStatus::Terminated) => return None,
            Binding::Pending(_) => ConflictReason::ContextActive("awaiting install".to_string()),
            Binding::Bound(_, AppContextStatus::Terminating) => ConflictReason::BeingTerminated,
            Binding::Bound(_, AppContextStatus::InstantiateFailed | AppContextStatus::TerminateFailed) => {
                ConflictReason::MustTerminateFirst
            }
            Binding::Bound(_, status @ (AppContextStatus::Instantiated | AppContextStatus::Instantiating)) => {
                ConflictReason::ContextActive(status.to_string())
            }
            Binding::Bound(_, other) => ConflictReason::UnexpectedStatus(other.to_string()),
        };
        Some(reason)
    }
}

impl Backends {
    /// Bundle the two stores
    pub fn new(store: Arc<dyn StoreTrait>, contexts: Arc<dyn ContextStoreTrait>) -> Self {
        Self { store, contexts }
    }

    /// Id of the AppContext bound to a Logical Cloud
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn context_id(&self, project: &str, name: &str) -> Result<Option<String>, DcmError> {
        let key = LogicalCloudKey::new(project, name).to_store_key()?;
        Ok(find_value(self.store.as_ref(), ORCHESTRATOR_COLLECTION, &key, tags::CONTEXT).await?)
    }

    /// Current binding of a Logical Cloud
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::Internal`] when the metadata names an AppContext
    /// that cannot be loaded; the inconsistency is surfaced, not repaired.
    pub async fn binding(&self, project: &str, name: &str) -> Result<Binding, DcmError> {
        let Some(id) = self.context_id(project, name).await? else {
            return Ok(Binding::Unbound);
        };

        let ctx = AppContext::load(Arc::clone(&self.contexts), &id)
            .await
            .map_err(|e| {
                DcmError::internal(&format!("Logical Cloud {name} is bound to AppContext {id}"), e)
            })?;

        match ctx.get_status().await {
            Ok(status) => Ok(Binding::Bound(ctx, status)),
            Err(AppContextError::NotFound(_)) => Ok(Binding::Pending(ctx)),
            Err(e) => Err(e.into()),
        }
    }

    /// Record `id` as the AppContext of a Logical Cloud, together with the
    /// inverse lookup row
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn bind(&self, project: &str, name: &str, id: &str) -> Result<(), DcmError> {
        let lc_key = LogicalCloudKey::new(project, name);
        let entries = vec![
            StoreEntry::new(lc_key.to_store_key()?, tags::CONTEXT, marshal(id)?),
            StoreEntry::new(
                AppContextKey { lccontext: id }.to_store_key()?,
                tags::CONTEXT,
                marshal(&lc_key)?,
            ),
        ];
        self.store.insert_batch(ORCHESTRATOR_COLLECTION, entries).await?;
        debug!(project, logical_cloud = name, app_context = id, "bound AppContext");
        Ok(())
    }

    /// Drop the binding of a Logical Cloud to `id`
    ///
    /// A missing inverse row is tolerated.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn unbind(&self, project: &str, name: &str, id: &str) -> Result<(), DcmError> {
        let lc_key = LogicalCloudKey::new(project, name).to_store_key()?;
        self.store
            .remove_tag(ORCHESTRATOR_COLLECTION, &lc_key, tags::CONTEXT)
            .await?;

        let inverse = AppContextKey { lccontext: id }.to_store_key()?;
        match self.store.remove(ORCHESTRATOR_COLLECTION, &inverse).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(project, logical_cloud = name, app_context = id, "inverse AppContext record already gone");
            }
            Err(e) => return Err(e.into()),
        }
        debug!(project, logical_cloud = name, app_context = id, "released AppContext");
        Ok(())
    }

    /// Logical Cloud an AppContext belongs to
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotFound`] when no Logical Cloud is bound to `id`.
    pub async fn resolve(&self, id: &str) -> Result<LogicalCloudKey, DcmError> {
        let key = AppContextKey { lccontext: id }.to_store_key()?;
        find_value(self.store.as_ref(), ORCHESTRATOR_COLLECTION, &key, tags::CONTEXT)
            .await?
            .ok_or_else(|| DcmError::NotFound(format!("Logical Cloud for AppContext {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appcontext::MemoryContextStore;
    use dcm_store::MemoryStore;

    fn backends() -> Backends {
        Backends::new(Arc::new(MemoryStore::new()), Arc::new(MemoryContextStore::new()))
    }

    #[tokio::test]
    async fn test_unbound_without_context() {
        let backends = backends();
        assert!(matches!(backends.binding("p", "lc").await.unwrap(), Binding::Unbound));
    }

    #[tokio::test]
    async fn test_bind_resolve_unbind() {
        let backends = backends();
        let ctx = AppContext::init(Arc::clone(&backends.contexts)).await.unwrap();
        ctx.create_composite_app().await.unwrap();

        backends.bind("p", "lc", ctx.id()).await.unwrap();
        assert!(matches!(backends.binding("p", "lc").await.unwrap(), Binding::Pending(_)));
        assert_eq!(backends.resolve(ctx.id()).await.unwrap(), LogicalCloudKey::new("p", "lc"));

        ctx.set_status(&AppContextStatus::Instantiated).await.unwrap();
        let binding = backends.binding("p", "lc").await.unwrap();
        assert_eq!(binding.status(), Some(&AppContextStatus::Instantiated));

        backends.unbind("p", "lc", ctx.id()).await.unwrap();
        assert!(backends.context_id("p", "lc").await.unwrap().is_none());
        assert!(matches!(backends.resolve(ctx.id()).await, Err(DcmError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_dangling_binding_is_internal_error() {
        let backends = backends();
        backends.bind("p", "lc", "12345").await.unwrap();
        let err = backends.binding("p", "lc").await.unwrap_err();
        assert!(matches!(err, DcmError::Internal(_)));
    }
}
