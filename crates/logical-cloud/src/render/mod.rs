//! Kubernetes resources of a Level-1 Logical Cloud
//!
//! Every cluster of a Level-1 cloud receives the same bundle: the namespace,
//! one resource quota, the user's certificate signing request (with a
//! pre-approval subresource), and one Role or ClusterRole plus binding per
//! user permission. Bodies are YAML, names are `<name>+<Kind>`.

pub mod csr;

use crate::error::DcmError;
use crate::models::{LogicalCloud, Quota, UserPermission};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Namespace, ResourceQuota, ResourceQuotaSpec};
use k8s_openapi::api::rbac::v1::{PolicyRule, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

pub use csr::{DEFAULT_KEY_BITS, MIN_KEY_BITS, UserCredentials, generate_user_credentials};

const RBAC_API_VERSION: &str = "rbac.authorization.k8s.io/v1beta1";
const CSR_API_VERSION: &str = "certificates.k8s.io/v1beta1";
const CSR_USAGES: [&str; 2] = ["digital signature", "key encipherment"];

/// Name of the CSR subresource pre-approving the request
pub const APPROVAL_SUBRESOURCE: &str = "approval";
/// Message of the pre-approval condition
pub const APPROVAL_MESSAGE: &str = "Approved for Logical Cloud authentication";
/// Reason of the pre-approval condition
pub const APPROVAL_REASON: &str = "LogicalCloud";

/// One rendered resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResource {
    /// `<name>+<Kind>`, the resource name inside the AppContext
    pub name: String,
    /// YAML body
    pub body: String,
}

impl RenderedResource {
    fn new<T: Serialize>(name: &str, kind: &str, object: &T) -> Result<Self, DcmError> {
        let body = serde_yaml::to_string(object)
            .map_err(|e| DcmError::internal(&format!("rendering {kind} {name}"), e))?;
        Ok(Self {
            name: format!("{name}+{kind}"),
            body,
        })
    }
}

/// Resources applied to each cluster of a Level-1 Logical Cloud
#[derive(Debug, Clone)]
pub struct ResourceBundle {
    /// Namespace of the cloud
    pub namespace: RenderedResource,
    /// Quota of the namespace
    pub quota: RenderedResource,
    /// Certificate signing request of the user
    pub csr: RenderedResource,
    /// JSON pre-approval condition, stored as the CSR's `approval` subresource
    pub approval: String,
    /// One Role or ClusterRole per user permission
    pub roles: Vec<RenderedResource>,
    /// One binding per role, same index
    pub role_bindings: Vec<RenderedResource>,
    /// Base64 PEM private key matching the CSR
    pub private_key: String,
}

impl ResourceBundle {
    /// Every resource in apply order
    pub fn resources(&self) -> impl Iterator<Item = &RenderedResource> {
        [&self.namespace, &self.quota, &self.csr]
            .into_iter()
            .chain(&self.roles)
            .chain(&self.role_bindings)
    }

    /// Resource apply order: namespace, quota, csr, roles, bindings
    #[must_use]
    pub fn order(&self) -> Value {
        let names: Vec<&str> = self.resources().map(|r| r.name.as_str()).collect();
        json!({ "resorder": names })
    }

    /// Resource readiness dependencies
    #[must_use]
    pub fn dependencies(&self) -> Value {
        let mut deps = BTreeMap::new();
        deps.insert(self.namespace.name.clone(), "go".to_string());
        deps.insert(self.quota.name.clone(), format!("wait on {}", self.namespace.name));
        deps.insert(self.csr.name.clone(), format!("wait on {}", self.quota.name));
        for (role, binding) in self.roles.iter().zip(&self.role_bindings) {
            deps.insert(role.name.clone(), format!("wait on {}", self.csr.name));
            deps.insert(binding.name.clone(), format!("wait on {}", role.name));
        }
        json!({ "resdependency": deps })
    }

    /// Subresource order of the CSR
    #[must_use]
    pub fn subresource_order() -> Value {
        json!({ "subresorder": [APPROVAL_SUBRESOURCE] })
    }

    /// Subresource dependencies of the CSR
    #[must_use]
    pub fn subresource_dependencies() -> Value {
        json!({ "subresdependency": { APPROVAL_SUBRESOURCE: "go" } })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CertificateSigningRequest {
    api_version: &'static str,
    kind: &'static str,
    metadata: ObjectMeta,
    spec: CertificateSigningRequestSpec,
}

#[derive(Serialize)]
struct CertificateSigningRequestSpec {
    request: String,
    usages: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Role {
    api_version: &'static str,
    kind: &'static str,
    metadata: ObjectMeta,
    rules: Vec<PolicyRule>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoleBinding {
    api_version: &'static str,
    kind: &'static str,
    metadata: ObjectMeta,
    subjects: Vec<Subject>,
    role_ref: RoleRef,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Approval<'a> {
    last_update_time: String,
    message: &'a str,
    reason: &'a str,
    #[serde(rename = "type")]
    condition_type: &'a str,
}

fn metadata(name: &str, namespace: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        ..ObjectMeta::default()
    }
}

fn render_namespace(name: &str) -> Result<RenderedResource, DcmError> {
    let ns = Namespace {
        metadata: metadata(name, None),
        ..Namespace::default()
    };
    RenderedResource::new(name, "Namespace", &ns)
}

fn render_quota(quota: &Quota, namespace: &str) -> Result<RenderedResource, DcmError> {
    let hard: BTreeMap<String, Quantity> = quota
        .spec
        .iter()
        .map(|(k, v)| (k.clone(), Quantity(v.clone())))
        .collect();
    let rq = ResourceQuota {
        metadata: metadata(&quota.metadata.name, Some(namespace)),
        spec: Some(ResourceQuotaSpec {
            hard: Some(hard),
            ..ResourceQuotaSpec::default()
        }),
        ..ResourceQuota::default()
    };
    RenderedResource::new(&quota.metadata.name, "ResourceQuota", &rq)
}

fn render_csr(lc: &LogicalCloud, csr_pem: &str) -> Result<RenderedResource, DcmError> {
    let name = format!("{}-user-csr", lc.name());
    let csr = CertificateSigningRequest {
        api_version: CSR_API_VERSION,
        kind: "CertificateSigningRequest",
        metadata: metadata(&name, None),
        spec: CertificateSigningRequestSpec {
            request: STANDARD.encode(csr_pem.as_bytes()),
            usages: CSR_USAGES.iter().map(ToString::to_string).collect(),
        },
    };
    RenderedResource::new(&name, "CertificateSigningRequest", &csr)
}

fn render_approval(now: DateTime<Utc>) -> Result<String, DcmError> {
    let approval = Approval {
        last_update_time: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        message: APPROVAL_MESSAGE,
        reason: APPROVAL_REASON,
        condition_type: "Approved",
    };
    serde_json::to_string(&approval).map_err(|e| DcmError::internal("rendering CSR approval", e))
}

fn render_role(
    lc: &LogicalCloud,
    index: usize,
    permission: &UserPermission,
) -> Result<(RenderedResource, RenderedResource), DcmError> {
    let cluster_scoped = permission.is_cluster_scoped();
    let (role_kind, binding_kind, role_name, binding_name, namespace) = if cluster_scoped {
        (
            "ClusterRole",
            "ClusterRoleBinding",
            format!("{}-clusterRole{index}", lc.name()),
            format!("{}-clusterRoleBinding{index}", lc.name()),
            None,
        )
    } else {
        (
            "Role",
            "RoleBinding",
            format!("{}-role{index}", lc.name()),
            format!("{}-roleBinding{index}", lc.name()),
            Some(permission.spec.namespace.as_str()),
        )
    };

    let role = Role {
        api_version: RBAC_API_VERSION,
        kind: role_kind,
        metadata: metadata(&role_name, namespace),
        rules: vec![PolicyRule {
            api_groups: Some(permission.spec.api_groups.clone()),
            resources: Some(permission.spec.resources.clone()),
            verbs: permission.spec.verbs.clone(),
            ..PolicyRule::default()
        }],
    };

    let binding = RoleBinding {
        api_version: RBAC_API_VERSION,
        kind: binding_kind,
        metadata: metadata(&binding_name, namespace),
        subjects: vec![Subject {
            kind: "User".to_string(),
            name: lc.user_name().to_string(),
            api_group: Some(String::new()),
            ..Subject::default()
        }],
        role_ref: RoleRef {
            kind: role_kind.to_string(),
            name: role_name.clone(),
            api_group: String::new(),
        },
    };

    Ok((
        RenderedResource::new(&role_name, role_kind, &role)?,
        RenderedResource::new(&binding_name, binding_kind, &binding)?,
    ))
}

/// Render the bundle of a Level-1 Logical Cloud from already generated
/// credentials. Only the first quota is applied.
///
/// # Errors
///
/// Returns [`DcmError::PreconditionMissing`] when `quotas` is empty and
/// [`DcmError::Internal`] when a body fails to serialize.
pub fn render_bundle(
    lc: &LogicalCloud,
    quotas: &[Quota],
    permissions: &[UserPermission],
    credentials: &UserCredentials,
    now: DateTime<Utc>,
) -> Result<ResourceBundle, DcmError> {
    let quota = quotas
        .first()
        .ok_or_else(|| DcmError::PreconditionMissing("Logical Cloud has no Cluster Quotas".to_string()))?;

    let mut roles = Vec::with_capacity(permissions.len());
    let mut role_bindings = Vec::with_capacity(permissions.len());
    for (index, permission) in permissions.iter().enumerate() {
        let (role, binding) = render_role(lc, index, permission)?;
        roles.push(role);
        role_bindings.push(binding);
    }

    Ok(ResourceBundle {
        namespace: render_namespace(&lc.spec.namespace)?,
        quota: render_quota(quota, &lc.spec.namespace)?,
        csr: render_csr(lc, &credentials.csr_pem)?,
        approval: render_approval(now)?,
        roles,
        role_bindings,
        private_key: credentials.private_key.clone(),
    })
}

/// Generate fresh user credentials and render the bundle
///
/// # Errors
///
/// See [`render_bundle`] and [`generate_user_credentials`].
pub async fn render(
    lc: &LogicalCloud,
    quotas: &[Quota],
    permissions: &[UserPermission],
    key_bits: usize,
) -> Result<ResourceBundle, DcmError> {
    let credentials = generate_user_credentials(lc.user_name(), key_bits).await?;
    render_bundle(lc, quotas, permissions, &credentials, Utc::now())
}
