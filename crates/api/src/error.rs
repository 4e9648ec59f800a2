//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::{SagaFailure, SagaStatus};

/// API-level error type that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// A saga ran and did not complete.
    #[error(transparent)]
    Saga(#[from] SagaFailure),
    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(msg)),
            ApiError::Saga(failure) => saga_failure_to_response(&failure),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, error_body(msg))
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

fn error_body(message: String) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

/// Compensated sagas are a business rejection (422); a failed compensation
/// leaves the system inconsistent and is reported as a server error.
fn saga_failure_to_response(failure: &SagaFailure) -> (StatusCode, serde_json::Value) {
    let status = match failure.status() {
        SagaStatus::Failed => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    let compensation_errors: Vec<String> = failure
        .compensation_errors()
        .iter()
        .map(ToString::to_string)
        .collect();

    let body = serde_json::json!({
        "error": failure.step_error().to_string(),
        "instance_id": failure.instance_id(),
        "status": failure.status(),
        "failed_step": failure.failed_step(),
        "compensation_errors": compensation_errors,
    });
    (status, body)
}
