//! Records owned by a Logical Cloud: cluster references, quotas, user
//! permissions and key/value pairs

use super::{ApiError, ApiState};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use logical_cloud::{ClusterReference, KeyValue, Quota, UserPermission};

type LcPath = Path<(String, String)>;
type MemberPath = Path<(String, String, String)>;

pub(super) async fn create_cluster(
    State(state): State<ApiState>,
    Path((project, lc)): LcPath,
    Json(reference): Json<ClusterReference>,
) -> Result<(StatusCode, Json<ClusterReference>), ApiError> {
    let reference = state.service.clusters().create(&project, &lc, reference).await?;
    Ok((StatusCode::CREATED, Json(reference)))
}

pub(super) async fn get_clusters(
    State(state): State<ApiState>,
    Path((project, lc)): LcPath,
) -> Result<Json<Vec<ClusterReference>>, ApiError> {
    Ok(Json(state.service.clusters().get_all(&project, &lc).await?))
}

pub(super) async fn get_cluster(
    State(state): State<ApiState>,
    Path((project, lc, name)): MemberPath,
) -> Result<Json<ClusterReference>, ApiError> {
    Ok(Json(state.service.clusters().get(&project, &lc, &name).await?))
}

pub(super) async fn update_cluster(
    State(state): State<ApiState>,
    Path((project, lc, name)): MemberPath,
    Json(reference): Json<ClusterReference>,
) -> Result<Json<ClusterReference>, ApiError> {
    Ok(Json(state.service.clusters().update(&project, &lc, &name, reference).await?))
}

pub(super) async fn delete_cluster(
    State(state): State<ApiState>,
    Path((project, lc, name)): MemberPath,
) -> Result<StatusCode, ApiError> {
    state.service.clusters().delete(&project, &lc, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// User kubeconfig of one cluster, as YAML
pub(super) async fn get_kubeconfig(
    State(state): State<ApiState>,
    Path((project, lc, name)): MemberPath,
) -> Result<impl IntoResponse, ApiError> {
    let kubeconfig = state.service.get_cluster_config(&project, &lc, &name).await?;
    Ok(([(header::CONTENT_TYPE, "application/yaml")], kubeconfig))
}

pub(super) async fn create_quota(
    State(state): State<ApiState>,
    Path((project, lc)): LcPath,
    Json(quota): Json<Quota>,
) -> Result<(StatusCode, Json<Quota>), ApiError> {
    let quota = state.service.quotas().create(&project, &lc, quota).await?;
    Ok((StatusCode::CREATED, Json(quota)))
}

pub(super) async fn get_quotas(
    State(state): State<ApiState>,
    Path((project, lc)): LcPath,
) -> Result<Json<Vec<Quota>>, ApiError> {
    Ok(Json(state.service.quotas().get_all(&project, &lc).await?))
}

pub(super) async fn get_quota(
    State(state): State<ApiState>,
    Path((project, lc, name)): MemberPath,
) -> Result<Json<Quota>, ApiError> {
    Ok(Json(state.service.quotas().get(&project, &lc, &name).await?))
}

pub(super) async fn update_quota(
    State(state): State<ApiState>,
    Path((project, lc, name)): MemberPath,
    Json(quota): Json<Quota>,
) -> Result<Json<Quota>, ApiError> {
    Ok(Json(state.service.quotas().update(&project, &lc, &name, quota).await?))
}

pub(super) async fn delete_quota(
    State(state): State<ApiState>,
    Path((project, lc, name)): MemberPath,
) -> Result<StatusCode, ApiError> {
    state.service.quotas().delete(&project, &lc, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn create_permission(
    State(state): State<ApiState>,
    Path((project, lc)): LcPath,
    Json(permission): Json<UserPermission>,
) -> Result<(StatusCode, Json<UserPermission>), ApiError> {
    let permission = state
        .service
        .user_permissions()
        .create(&project, &lc, permission)
        .await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

pub(super) async fn get_permissions(
    State(state): State<ApiState>,
    Path((project, lc)): LcPath,
) -> Result<Json<Vec<UserPermission>>, ApiError> {
    Ok(Json(state.service.user_permissions().get_all(&project, &lc).await?))
}

pub(super) async fn get_permission(
    State(state): State<ApiState>,
    Path((project, lc, name)): MemberPath,
) -> Result<Json<UserPermission>, ApiError> {
    Ok(Json(state.service.user_permissions().get(&project, &lc, &name).await?))
}

pub(super) async fn update_permission(
    State(state): State<ApiState>,
    Path((project, lc, name)): MemberPath,
    Json(permission): Json<UserPermission>,
) -> Result<Json<UserPermission>, ApiError> {
    Ok(Json(
        state
            .service
            .user_permissions()
            .update(&project, &lc, &name, permission)
            .await?,
    ))
}

pub(super) async fn delete_permission(
    State(state): State<ApiState>,
    Path((project, lc, name)): MemberPath,
) -> Result<StatusCode, ApiError> {
    state.service.user_permissions().delete(&project, &lc, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn create_key_value(
    State(state): State<ApiState>,
    Path((project, lc)): LcPath,
    Json(kv): Json<KeyValue>,
) -> Result<(StatusCode, Json<KeyValue>), ApiError> {
    let kv = state.service.key_values().create(&project, &lc, kv).await?;
    Ok((StatusCode::CREATED, Json(kv)))
}

pub(super) async fn get_key_values(
    State(state): State<ApiState>,
    Path((project, lc)): LcPath,
) -> Result<Json<Vec<KeyValue>>, ApiError> {
    Ok(Json(state.service.key_values().get_all(&project, &lc).await?))
}

pub(super) async fn get_key_value(
    State(state): State<ApiState>,
    Path((project, lc, name)): MemberPath,
) -> Result<Json<KeyValue>, ApiError> {
    Ok(Json(state.service.key_values().get(&project, &lc, &name).await?))
}

pub(super) async fn update_key_value(
    State(state): State<ApiState>,
    Path((project, lc, name)): MemberPath,
    Json(kv): Json<KeyValue>,
) -> Result<Json<KeyValue>, ApiError> {
    Ok(Json(state.service.key_values().update(&project, &lc, &name, kv).await?))
}

pub(super) async fn delete_key_value(
    State(state): State<ApiState>,
    Path((project, lc, name)): MemberPath,
) -> Result<StatusCode, ApiError> {
    state.service.key_values().delete(&project, &lc, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
