//! REST surface
//!
//! Routes mirror the orchestrator layout: everything lives under
//! `/v2/projects/{project}/logical-clouds`.

mod error;
mod logical_clouds;
mod members;
mod projects;

pub use error::ApiError;

use axum::Router;
use axum::routing::{get, post};
use dcm_store::StoreTrait;
use logical_cloud::DcmService;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// State shared by every handler
#[derive(Clone)]
pub struct ApiState {
    /// Logical Cloud service
    pub service: DcmService,
    /// Metadata store holding the controller registry
    pub registry: Arc<dyn StoreTrait>,
}

impl std::fmt::Debug for ApiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiState").field("service", &self.service).finish_non_exhaustive()
    }
}

const LC: &str = "/v2/projects/{project}/logical-clouds/{logical_cloud}";

/// Build the HTTP router
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v2/controllers", post(projects::register_controller))
        .route("/v2/projects", post(projects::create))
        .route("/v2/projects/{project}", get(projects::get))
        .route(
            "/v2/projects/{project}/logical-clouds",
            post(logical_clouds::create).get(logical_clouds::get_all),
        )
        .route(
            LC,
            get(logical_clouds::get)
                .put(logical_clouds::update)
                .delete(logical_clouds::delete),
        )
        .route(&format!("{LC}/instantiate"), post(logical_clouds::instantiate))
        .route(&format!("{LC}/terminate"), post(logical_clouds::terminate))
        .route(&format!("{LC}/stop"), post(logical_clouds::stop))
        .route(
            &format!("{LC}/cluster-references"),
            post(members::create_cluster).get(members::get_clusters),
        )
        .route(
            &format!("{LC}/cluster-references/{{name}}"),
            get(members::get_cluster)
                .put(members::update_cluster)
                .delete(members::delete_cluster),
        )
        .route(
            &format!("{LC}/cluster-references/{{name}}/kubeconfig"),
            get(members::get_kubeconfig),
        )
        .route(
            &format!("{LC}/cluster-quotas"),
            post(members::create_quota).get(members::get_quotas),
        )
        .route(
            &format!("{LC}/cluster-quotas/{{name}}"),
            get(members::get_quota)
                .put(members::update_quota)
                .delete(members::delete_quota),
        )
        .route(
            &format!("{LC}/user-permissions"),
            post(members::create_permission).get(members::get_permissions),
        )
        .route(
            &format!("{LC}/user-permissions/{{name}}"),
            get(members::get_permission)
                .put(members::update_permission)
                .delete(members::delete_permission),
        )
        .route(
            &format!("{LC}/kv-pairs"),
            post(members::create_key_value).get(members::get_key_values),
        )
        .route(
            &format!("{LC}/kv-pairs/{{name}}"),
            get(members::get_key_value)
                .put(members::update_key_value)
                .delete(members::delete_key_value),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
