//! Logical Cloud definitions and lifecycle actions

use super::{ApiError, ApiState};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use logical_cloud::LogicalCloud;

pub(super) async fn create(
    State(state): State<ApiState>,
    Path(project): Path<String>,
    Json(lc): Json<LogicalCloud>,
) -> Result<(StatusCode, Json<LogicalCloud>), ApiError> {
    let lc = state.service.logical_clouds().create(&project, lc).await?;
    Ok((StatusCode::CREATED, Json(lc)))
}

pub(super) async fn get_all(
    State(state): State<ApiState>,
    Path(project): Path<String>,
) -> Result<Json<Vec<LogicalCloud>>, ApiError> {
    Ok(Json(state.service.logical_clouds().get_all(&project).await?))
}

pub(super) async fn get(
    State(state): State<ApiState>,
    Path((project, name)): Path<(String, String)>,
) -> Result<Json<LogicalCloud>, ApiError> {
    Ok(Json(state.service.logical_clouds().get(&project, &name).await?))
}

pub(super) async fn update(
    State(state): State<ApiState>,
    Path((project, name)): Path<(String, String)>,
    Json(lc): Json<LogicalCloud>,
) -> Result<Json<LogicalCloud>, ApiError> {
    Ok(Json(state.service.logical_clouds().update(&project, &name, lc).await?))
}

pub(super) async fn delete(
    State(state): State<ApiState>,
    Path((project, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_logical_cloud(&project, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn instantiate(
    State(state): State<ApiState>,
    Path((project, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.service.instantiate(&project, &name).await?;
    Ok(StatusCode::ACCEPTED)
}

pub(super) async fn terminate(
    State(state): State<ApiState>,
    Path((project, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.service.terminate(&project, &name).await?;
    Ok(StatusCode::ACCEPTED)
}

pub(super) async fn stop(
    State(state): State<ApiState>,
    Path((project, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.service.stop(&project, &name).await?;
    Ok(StatusCode::ACCEPTED)
}
