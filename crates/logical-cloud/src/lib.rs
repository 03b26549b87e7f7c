//! Logical Cloud core of the distributed cloud manager
//!
//! A Logical Cloud is a named slice of one or more member clusters: a
//! namespace, a user with generated credentials, RBAC permissions and a
//! resource quota. This crate stores Logical Cloud definitions, renders their
//! Kubernetes resources into an AppContext, hands the AppContext to the
//! resource synchronizer, and assembles per-cluster user kubeconfigs once the
//! clusters have signed the user's certificate.
//!
//! # Example
//!
//! ```no_run
//! use logical_cloud::{Backends, DcmService, EngineConfig};
//! use dcm_store::MemoryStore;
//! use appcontext::MemoryContextStore;
//! use rsync_client::{RsyncClient, RsyncEndpoint, StoreCloudConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), logical_cloud::DcmError> {
//! let store = Arc::new(MemoryStore::new());
//! let backends = Backends::new(store.clone(), Arc::new(MemoryContextStore::new()));
//! let rsync = RsyncClient::new(
//!     RsyncEndpoint::Static("http://rsync:9031".to_string()),
//!     Duration::from_secs(10),
//! );
//! let service = DcmService::new(
//!     backends,
//!     Arc::new(rsync),
//!     Arc::new(StoreCloudConfig::new(store)),
//!     EngineConfig::default(),
//! );
//!
//! service.instantiate("project", "lc1").await?;
//! let kubeconfig = service.get_cluster_config("project", "lc1", "edge1").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Configuration**: CRUD for Logical Clouds, cluster references, quotas,
//!   user permissions and key/value pairs
//! - **Lifecycle**: instantiate, terminate and stop, guarded by the
//!   AppContext status
//! - **Credentials**: RSA user keys and CSRs, pre-approved on every cluster
//! - **Kubeconfigs**: assembled from the issued certificates and registered
//!   with the CloudConfig store

pub mod backoff;
pub mod binding;
pub mod error;
pub mod kubeconfig;
pub mod lifecycle;
pub mod manager;
pub mod models;
pub mod render;
pub mod service;

pub use binding::{Backends, Binding};
pub use error::{ConflictReason, DcmError, ErrorKind};
pub use kubeconfig::{Kubeconfig, KubeconfigAssembler};
pub use lifecycle::{EngineConfig, LifecycleEngine, ReadinessSupervisor};
pub use manager::{
    ClusterManager, KeyValueManager, LogicalCloudManager, ProjectManager, QuotaManager,
    UserPermissionManager,
};
pub use models::{
    ClusterReference, ClusterReferenceSpec, KeyValue, KeyValueSpec, LogicalCloud,
    LogicalCloudSpec, Metadata, Project, Quota, UserData, UserPermission, UserPermissionSpec,
};
pub use service::DcmService;
