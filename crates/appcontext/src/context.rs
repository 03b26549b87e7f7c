//! AppContext tree
//!
//! A context is rooted at `/context/<id>/` and laid out as:
//!
//! ```text
//! /context/<id>/
//!   status/
//!   app/<app>/
//!     cluster/<provider+cluster>/
//!       resource/<name+Kind>/
//!       resource/<name+Kind>/subresource/<sub>/
//!       resource/<name+Kind>/subresource/instruction/{order,dependency}/
//!       resource/instruction/{order,dependency}/
//!       status/
//!   app/instruction/{order,dependency}/
//! ```
//!
//! Every `add_*` call returns a [`Handle`] naming the node it wrote, which is
//! passed to later calls to build children.

use crate::context_trait::ContextStoreTrait;
use crate::error::AppContextError;
use crate::status::{AppContextStatus, StatusRecord};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Opaque reference to a node of the tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle(String);

impl Handle {
    /// Path of the node, always ending in `/`
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn child(&self, segment: &str) -> Handle {
        Handle(format!("{}{}/", self.0, segment.trim_matches('/')))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which level an instruction applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionLevel {
    /// Ordering of apps; attached to the composite app handle
    App,
    /// Ordering of resources; attached to a cluster handle
    Resource,
    /// Ordering of subresources; attached to a resource handle
    SubResource,
}

impl InstructionLevel {
    fn segment(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Resource => "resource",
            Self::SubResource => "subresource",
        }
    }
}

/// Kind of instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    /// Apply order
    Order,
    /// Readiness dependencies
    Dependency,
}

impl InstructionKind {
    fn segment(self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Dependency => "dependency",
        }
    }
}

/// One AppContext tree
#[derive(Clone)]
pub struct AppContext {
    store: Arc<dyn ContextStoreTrait>,
    id: String,
    root: Handle,
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext").field("id", &self.id).finish_non_exhaustive()
    }
}

fn root_for(id: &str) -> Handle {
    Handle(format!("/context/{id}/"))
}

impl AppContext {
    /// Allocate a fresh context id. Nothing is written until
    /// [`AppContext::create_composite_app`].
    ///
    /// # Errors
    ///
    /// Propagates backend errors from the uniqueness check.
    pub async fn init(store: Arc<dyn ContextStoreTrait>) -> Result<Self, AppContextError> {
        loop {
            let (high, _) = uuid::Uuid::new_v4().as_u64_pair();
            let id = (high >> 1).to_string();
            let root = root_for(&id);
            if store.get(root.as_str()).await?.is_none() {
                debug!(app_context = %id, "allocated AppContext id");
                return Ok(Self { store, id, root });
            }
        }
    }

    /// Open an existing context
    ///
    /// # Errors
    ///
    /// Returns [`AppContextError::NotFound`] when no tree exists for `id`.
    pub async fn load(store: Arc<dyn ContextStoreTrait>, id: &str) -> Result<Self, AppContextError> {
        let root = root_for(id);
        if store.get(root.as_str()).await?.is_none() {
            return Err(AppContextError::NotFound(root.0));
        }
        Ok(Self {
            store,
            id: id.to_string(),
            root,
        })
    }

    /// Context id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    async fn put_value<T: Serialize + Sync + ?Sized>(
        &self,
        handle: &Handle,
        value: &T,
    ) -> Result<(), AppContextError> {
        self.ensure_owned(handle)?;
        self.store.put(handle.as_str(), serde_json::to_vec(value)?).await
    }

    fn ensure_owned(&self, handle: &Handle) -> Result<(), AppContextError> {
        if handle.as_str().starts_with(self.root.as_str()) {
            Ok(())
        } else {
            Err(AppContextError::InvalidHandle(format!(
                "{handle} is not part of context {}",
                self.id
            )))
        }
    }

    /// Write the root node; its value is the context id
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn create_composite_app(&self) -> Result<Handle, AppContextError> {
        self.put_value(&self.root, self.id.as_str()).await?;
        Ok(self.root.clone())
    }

    /// Handle to the root node
    ///
    /// # Errors
    ///
    /// Returns [`AppContextError::NotFound`] when the root was never written
    /// or has been deleted.
    pub async fn get_composite_app_handle(&self) -> Result<Handle, AppContextError> {
        match self.store.get(self.root.as_str()).await? {
            Some(_) => Ok(self.root.clone()),
            None => Err(AppContextError::NotFound(self.root.0.clone())),
        }
    }

    /// Add an app below the composite app
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn add_app(&self, composite: &Handle, name: &str) -> Result<Handle, AppContextError> {
        let handle = composite.child("app").child(name);
        self.put_value(&handle, name).await?;
        Ok(handle)
    }

    /// Add a cluster (`provider+cluster`) below an app
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn add_cluster(&self, app: &Handle, name: &str) -> Result<Handle, AppContextError> {
        let handle = app.child("cluster").child(name);
        self.put_value(&handle, name).await?;
        Ok(handle)
    }

    /// Add a resource body (`name+Kind`) below a cluster
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn add_resource(
        &self,
        cluster: &Handle,
        name: &str,
        body: &str,
    ) -> Result<Handle, AppContextError> {
        let handle = cluster.child("resource").child(name);
        self.put_value(&handle, body).await?;
        Ok(handle)
    }

    /// Store a value at a relative path below `handle`, e.g.
    /// `subresource/approval`
    ///
    /// # Errors
    ///
    /// Propagates serialization and backend errors.
    pub async fn add_level_value<T: Serialize + Sync + ?Sized>(
        &self,
        handle: &Handle,
        sub_path: &str,
        value: &T,
    ) -> Result<Handle, AppContextError> {
        let handle = handle.child(sub_path);
        self.put_value(&handle, value).await?;
        Ok(handle)
    }

    /// Store an order or dependency instruction
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn add_instruction(
        &self,
        handle: &Handle,
        level: InstructionLevel,
        kind: InstructionKind,
        body: &serde_json::Value,
    ) -> Result<Handle, AppContextError> {
        let handle = handle
            .child(level.segment())
            .child("instruction")
            .child(kind.segment());
        self.put_value(&handle, body).await?;
        Ok(handle)
    }

    /// Read the value stored at a handle
    ///
    /// # Errors
    ///
    /// Returns [`AppContextError::NotFound`] when nothing is stored there.
    pub async fn get_value(&self, handle: &Handle) -> Result<serde_json::Value, AppContextError> {
        self.ensure_owned(handle)?;
        let bytes = self
            .store
            .get(handle.as_str())
            .await?
            .ok_or_else(|| AppContextError::NotFound(handle.0.clone()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Handle for a named level below `handle`, which must already exist
    ///
    /// # Errors
    ///
    /// Returns [`AppContextError::NotFound`] when the level was never written.
    pub async fn get_level_handle(&self, handle: &Handle, level: &str) -> Result<Handle, AppContextError> {
        let child = handle.child(level);
        match self.store.get(child.as_str()).await? {
            Some(_) => Ok(child),
            None => Err(AppContextError::NotFound(child.0)),
        }
    }

    /// Handle of the status the synchronizer writes for one cluster
    ///
    /// # Errors
    ///
    /// Returns [`AppContextError::NotFound`] when no status has been written.
    pub async fn get_cluster_status_handle(
        &self,
        app: &str,
        cluster: &str,
    ) -> Result<Handle, AppContextError> {
        let cluster_handle = self.root.child("app").child(app).child("cluster").child(cluster);
        self.get_level_handle(&cluster_handle, "status").await
    }

    async fn child_names(&self, prefix: &Handle) -> Result<Vec<String>, AppContextError> {
        let mut names: Vec<String> = Vec::new();
        for key in self.store.keys(prefix.as_str()).await? {
            let Some(rest) = key.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let Some(name) = rest.split('/').next().filter(|n| !n.is_empty()) else {
                continue;
            };
            if name != "instruction" && names.last().map(String::as_str) != Some(name) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Names of every app in the context
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn get_app_names(&self) -> Result<Vec<String>, AppContextError> {
        self.child_names(&self.root.child("app")).await
    }

    /// Names of every cluster under an app
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn get_cluster_names(&self, app: &str) -> Result<Vec<String>, AppContextError> {
        self.child_names(&self.root.child("app").child(app).child("cluster"))
            .await
    }

    /// Lifecycle status of the composite app
    ///
    /// # Errors
    ///
    /// Returns [`AppContextError::NotFound`] when the synchronizer has not
    /// written a status yet.
    pub async fn get_status(&self) -> Result<AppContextStatus, AppContextError> {
        let root = self.get_composite_app_handle().await?;
        let handle = self.get_level_handle(&root, "status").await?;
        let record: StatusRecord = serde_json::from_value(self.get_value(&handle).await?)?;
        Ok(AppContextStatus::parse(&record.status))
    }

    /// Write the lifecycle status of the composite app
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn set_status(&self, status: &AppContextStatus) -> Result<(), AppContextError> {
        let record = StatusRecord {
            status: status.as_str().to_string(),
        };
        self.add_level_value(&self.root, "status", &record).await?;
        Ok(())
    }

    /// Every key in the tree, sorted
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn get_all_keys(&self) -> Result<Vec<String>, AppContextError> {
        self.store.keys(self.root.as_str()).await
    }

    /// Remove the whole tree
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn delete_composite_app(&self) -> Result<(), AppContextError> {
        debug!(app_context = %self.id, "deleting composite app");
        self.store.delete_prefix(self.root.as_str()).await
    }
}
