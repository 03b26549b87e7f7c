//! Projects and the controller registry
//!
//! Both normally belong to the orchestrator. They are served here so a
//! standalone DCM can be populated.

use super::{ApiError, ApiState};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use logical_cloud::{DcmError, Project};
use rsync_client::{Controller, register_controller as register};
use tracing::info;

pub(super) async fn create(
    State(state): State<ApiState>,
    Json(project): Json<Project>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = state.service.projects().create(&project.metadata.name).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub(super) async fn get(
    State(state): State<ApiState>,
    Path(project): Path<String>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.service.projects().get(&project).await?))
}

pub(super) async fn register_controller(
    State(state): State<ApiState>,
    Json(controller): Json<Controller>,
) -> Result<(StatusCode, Json<Controller>), ApiError> {
    if controller.metadata.name.is_empty() {
        return Err(DcmError::InvalidInput("Controller name is required".to_string()).into());
    }
    register(state.registry.as_ref(), &controller)
        .await
        .map_err(|e| DcmError::internal("registering controller", e))?;
    info!(controller = %controller.metadata.name, endpoint = %controller.endpoint(), "registered controller");
    Ok((StatusCode::CREATED, Json(controller)))
}
