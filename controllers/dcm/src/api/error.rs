//! HTTP mapping of Logical Cloud errors

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use logical_cloud::{DcmError, ErrorKind};
use serde_json::json;
use tracing::{error, warn};

/// A [`DcmError`] on its way to an HTTP client
#[derive(Debug)]
pub struct ApiError(pub DcmError);

impl From<DcmError> for ApiError {
    fn from(e: DcmError) -> Self {
        Self(e)
    }
}

/// Status code for an error kind
fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists | ErrorKind::ConflictState | ErrorKind::CertificateRejected => {
            StatusCode::CONFLICT
        }
        ErrorKind::PreconditionMissing
        | ErrorKind::PreconditionMixedNamespaces
        | ErrorKind::InvalidInput
        | ErrorKind::NotInstantiated => StatusCode::BAD_REQUEST,
        ErrorKind::NotYetIssued => StatusCode::ACCEPTED,
        ErrorKind::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind());
        let message = self.0.to_string();
        if status.is_server_error() {
            error!(%status, error = %message, "request failed");
        } else {
            warn!(%status, error = %message, "request rejected");
        }

        let body = json!({
            "code": status.as_u16(),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}
