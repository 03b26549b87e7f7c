//! Logical Cloud records and their store keys
//!
//! Records serialize with the field names the REST API exposes, so the same
//! types are stored in the metadata store and returned to callers.

use crate::error::DcmError;
use dcm_store::StoreKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Collection holding every Logical Cloud row
pub const ORCHESTRATOR_COLLECTION: &str = "orchestrator";

/// Tags of the values stored on metadata rows
pub mod tags {
    /// Project record
    pub const PROJECT: &str = "projectmetadata";
    /// Logical Cloud definition
    pub const LOGICAL_CLOUD: &str = "logicalcloud";
    /// Cluster reference
    pub const CLUSTER: &str = "cluster";
    /// Cluster quota
    pub const QUOTA: &str = "quota";
    /// User permission
    pub const USER_PERMISSION: &str = "userpermission";
    /// Key/value pair
    pub const KEY_VALUE: &str = "keyvalue";
    /// AppContext id bound to a Logical Cloud, and the inverse record
    pub const CONTEXT: &str = "lccontext";
    /// Base64 PEM private key of the Logical Cloud user
    pub const PRIVATE_KEY: &str = "privatekey";
}

/// Name of the single app inside every Logical Cloud AppContext
pub const LOGICAL_CLOUD_APP: &str = "logical-cloud";

/// Level of a Logical Cloud with generated credentials
pub const LEVEL_STANDARD: &str = "1";
/// Level of a bring-your-own-namespace Logical Cloud
pub const LEVEL_ADMIN: &str = "0";

/// Common metadata block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Resource name, unique under its parent
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Opaque user data
    #[serde(default)]
    pub user_data1: String,
    /// Opaque user data
    #[serde(default)]
    pub user_data2: String,
}

impl Metadata {
    /// Metadata carrying only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Project owning Logical Clouds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project metadata
    pub metadata: Metadata,
}

/// Logical Cloud definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalCloud {
    /// Logical Cloud metadata
    pub metadata: Metadata,
    /// Logical Cloud spec
    #[serde(default)]
    pub spec: LogicalCloudSpec,
}

/// Logical Cloud spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalCloudSpec {
    /// Namespace of the cloud; for level 0 it is discovered on instantiate
    #[serde(default)]
    pub namespace: String,
    /// `"0"` or `"1"`; empty means `"1"`
    #[serde(default)]
    pub level: String,
    /// Identity the cloud issues credentials for
    #[serde(default)]
    pub user: UserData,
}

/// User of a Logical Cloud
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    /// User name; becomes the certificate CN and the RBAC subject
    #[serde(rename = "user-name", default)]
    pub user_name: String,
    /// User type, e.g. `certificate`
    #[serde(rename = "type", default)]
    pub user_type: String,
    /// Inline permissions carried for API compatibility
    #[serde(rename = "user-permissions", default, skip_serializing_if = "Vec::is_empty")]
    pub user_permissions: Vec<UserPerm>,
}

/// Inline permission of [`UserData`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPerm {
    /// Permission name
    #[serde(rename = "permission-name", default)]
    pub permission_name: String,
    /// API groups
    #[serde(rename = "apiGroups", default)]
    pub api_groups: Vec<String>,
    /// Resources
    #[serde(default)]
    pub resources: Vec<String>,
    /// Verbs
    #[serde(default)]
    pub verbs: Vec<String>,
}

impl LogicalCloud {
    /// Name of the cloud
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Effective level, defaulting to `"1"`
    #[must_use]
    pub fn level(&self) -> &str {
        if self.spec.level.is_empty() {
            LEVEL_STANDARD
        } else {
            &self.spec.level
        }
    }

    /// Whether the cloud brings its own namespace
    #[must_use]
    pub fn is_admin_level(&self) -> bool {
        self.level() == LEVEL_ADMIN
    }

    /// Name of the user the cloud authenticates
    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.spec.user.user_name
    }
}

/// Membership of a cluster in a Logical Cloud
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterReference {
    /// Reference metadata
    pub metadata: Metadata,
    /// Reference spec
    #[serde(default)]
    pub spec: ClusterReferenceSpec,
}

/// Cluster reference spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterReferenceSpec {
    /// Cluster provider
    #[serde(rename = "cluster-provider", default)]
    pub cluster_provider: String,
    /// Cluster name within the provider
    #[serde(rename = "cluster-name", default)]
    pub cluster_name: String,
    /// Load balancer address
    #[serde(rename = "loadbalancer-ip", default)]
    pub loadbalancer_ip: String,
    /// Base64 of the issued user certificate, filled once issued
    #[serde(default)]
    pub certificate: String,
}

impl ClusterReference {
    /// Name of the reference
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// `provider+cluster`, the cluster name used inside AppContexts
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}+{}", self.spec.cluster_provider, self.spec.cluster_name)
    }
}

/// Resource quota of a Logical Cloud
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    /// Quota metadata
    pub metadata: Metadata,
    /// Resource-quota keys to quantities, e.g. `limits.cpu: "4"`
    #[serde(default)]
    pub spec: BTreeMap<String, String>,
}

/// RBAC permission granted to the Logical Cloud user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermission {
    /// Permission metadata
    pub metadata: Metadata,
    /// Permission spec
    #[serde(default)]
    pub spec: UserPermissionSpec,
}

/// User permission spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermissionSpec {
    /// Namespace of the permission; empty makes it cluster-wide
    #[serde(default)]
    pub namespace: String,
    /// API groups
    #[serde(rename = "apiGroups", default)]
    pub api_groups: Vec<String>,
    /// Resources
    #[serde(default)]
    pub resources: Vec<String>,
    /// Verbs
    #[serde(default)]
    pub verbs: Vec<String>,
}

impl UserPermission {
    /// Whether the permission is cluster-wide
    #[must_use]
    pub fn is_cluster_scoped(&self) -> bool {
        self.spec.namespace.is_empty()
    }
}

/// Free-form attributes of a Logical Cloud
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Key/value metadata
    pub metadata: Metadata,
    /// Key/value spec
    #[serde(default)]
    pub spec: KeyValueSpec,
}

/// Key/value spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyValueSpec {
    /// List of single-entry maps
    #[serde(default)]
    pub kv: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Key of a project row
#[derive(Debug, Clone, Serialize)]
pub struct ProjectKey<'a> {
    /// Project name
    pub project: &'a str,
}

/// Key of a Logical Cloud row; an empty name lists the project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogicalCloudKey {
    /// Project name
    pub project: String,
    /// Logical Cloud name
    #[serde(rename = "logical-cloud-name")]
    pub logical_cloud_name: String,
}

impl LogicalCloudKey {
    /// Key for `(project, name)`
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            logical_cloud_name: name.into(),
        }
    }
}

/// Key of a child row of a Logical Cloud
#[derive(Debug, Clone, Serialize)]
pub struct ChildKey<'a> {
    /// Project name
    pub project: &'a str,
    /// Logical Cloud name
    #[serde(rename = "logical-cloud-name")]
    pub logical_cloud_name: &'a str,
    #[serde(skip)]
    field: &'static str,
    #[serde(skip)]
    name: &'a str,
}

/// Kind of child row, naming the key field it adds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    /// `clname`
    ClusterReference,
    /// `qname`
    Quota,
    /// `upname`
    UserPermission,
    /// `kvname`
    KeyValue,
}

impl ChildKind {
    /// Key field naming the child
    #[must_use]
    pub fn field(self) -> &'static str {
        match self {
            Self::ClusterReference => "clname",
            Self::Quota => "qname",
            Self::UserPermission => "upname",
            Self::KeyValue => "kvname",
        }
    }

    /// Tag of the child value
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::ClusterReference => tags::CLUSTER,
            Self::Quota => tags::QUOTA,
            Self::UserPermission => tags::USER_PERMISSION,
            Self::KeyValue => tags::KEY_VALUE,
        }
    }

    /// Human-readable name used in errors
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::ClusterReference => "Cluster Reference",
            Self::Quota => "Cluster Quota",
            Self::UserPermission => "User Permission",
            Self::KeyValue => "Key Value",
        }
    }
}

impl<'a> ChildKey<'a> {
    /// Key for one child; an empty `name` lists every child of the kind
    #[must_use]
    pub fn new(kind: ChildKind, project: &'a str, logical_cloud_name: &'a str, name: &'a str) -> Self {
        Self {
            project,
            logical_cloud_name,
            field: kind.field(),
            name,
        }
    }
}

/// Inverse key resolving an AppContext id to its Logical Cloud
#[derive(Debug, Clone, Serialize)]
pub struct AppContextKey<'a> {
    /// AppContext id
    pub lccontext: &'a str,
}

/// Conversion of typed keys into store keys
pub trait ToStoreKey {
    /// Store key for this typed key
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::Internal`] when the key is not a flat string map.
    fn to_store_key(&self) -> Result<StoreKey, DcmError>;
}

impl ToStoreKey for ProjectKey<'_> {
    fn to_store_key(&self) -> Result<StoreKey, DcmError> {
        Ok(StoreKey::from_serializable(self)?)
    }
}

impl ToStoreKey for LogicalCloudKey {
    fn to_store_key(&self) -> Result<StoreKey, DcmError> {
        Ok(StoreKey::from_serializable(self)?)
    }
}

impl ToStoreKey for ChildKey<'_> {
    fn to_store_key(&self) -> Result<StoreKey, DcmError> {
        Ok(StoreKey::from_serializable(self)?.with(self.field, self.name))
    }
}

impl ToStoreKey for AppContextKey<'_> {
    fn to_store_key(&self) -> Result<StoreKey, DcmError> {
        Ok(StoreKey::from_serializable(self)?)
    }
}
