use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mvcp_gpu::GpuError;
use mvcp_lifecycle::LifecycleError;
use serde_json::json;

pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::BAD_REQUEST, message: msg.into() }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::NOT_FOUND, message: msg.into() }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::CONFLICT, message: msg.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, message: msg.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::InvalidArgument(_) => ApiError::bad_request(e.to_string()),
            LifecycleError::NotFound(_) => ApiError::not_found(e.to_string()),
            LifecycleError::Domain(_) | LifecycleError::Store(_) | LifecycleError::Provider(_) => {
                ApiError::internal(e.to_string())
            }
        }
    }
}

/// Exhaustion and backend failure are both surfaced as 500s with a
/// descriptive message, not 503 — callers are expected to read the message
/// rather than branch on status for these two.
impl From<GpuError> for ApiError {
    fn from(e: GpuError) -> Self {
        match e {
            GpuError::DuplicateWorkload(_) => ApiError::conflict(e.to_string()),
            GpuError::UnknownWorkload(_) => ApiError::not_found(e.to_string()),
            GpuError::NoSuitableDevice | GpuError::BackendPartitionFailed(_) => ApiError::internal(e.to_string()),
        }
    }
}
