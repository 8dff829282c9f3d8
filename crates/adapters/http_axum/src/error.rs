//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use govhub_domain::error::GovError;

/// JSON error body returned by API endpoints: a machine-readable kind plus
/// a human-readable reason.
#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    error: String,
}

/// Stable machine-readable name for an error, shared between HTTP bodies
/// and WebSocket error frames.
#[must_use]
pub fn error_kind(err: &GovError) -> &'static str {
    match err {
        GovError::Validation(_) => "validation",
        GovError::NotFound(_) => "not_found",
        GovError::InvalidTransition(_) => "invalid_transition",
        GovError::InvalidState(_) => "invalid_state",
        GovError::Conflict(_) => "conflict",
        GovError::Authentication(_) => "authentication",
        GovError::Authorization(_) => "authorization",
        GovError::RateLimit(_) => "rate_limit",
        GovError::Integrity(_) => "integrity",
        GovError::Transport(_) => "transport",
        GovError::AlreadyProcessing(_) => "already_processing",
        GovError::PartialFailure(_) => "partial_failure",
        GovError::Platform(_) => "platform",
        GovError::Storage(_) => "storage",
    }
}

/// Human-readable reason including the underlying cause.
#[must_use]
pub fn error_message(err: &GovError) -> String {
    match std::error::Error::source(err) {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}

/// Maps [`GovError`] to an HTTP response with appropriate status code.
pub struct ApiError(GovError);

impl From<GovError> for ApiError {
    fn from(err: GovError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = error_kind(&self.0);
        let (status, message) = match &self.0 {
            GovError::Validation(_) => (StatusCode::BAD_REQUEST, error_message(&self.0)),
            GovError::NotFound(_) => (StatusCode::NOT_FOUND, error_message(&self.0)),
            GovError::InvalidTransition(_)
            | GovError::InvalidState(_)
            | GovError::Conflict(_)
            | GovError::AlreadyProcessing(_) => (StatusCode::CONFLICT, error_message(&self.0)),
            GovError::Authentication(_) => (StatusCode::UNAUTHORIZED, error_message(&self.0)),
            GovError::Authorization(_) => (StatusCode::FORBIDDEN, error_message(&self.0)),
            GovError::RateLimit(_) => (StatusCode::TOO_MANY_REQUESTS, error_message(&self.0)),
            GovError::Integrity(_) => (StatusCode::UNPROCESSABLE_ENTITY, error_message(&self.0)),
            GovError::Transport(_)
            | GovError::Platform(_)
            | GovError::PartialFailure(_) => (StatusCode::BAD_GATEWAY, error_message(&self.0)),
            GovError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { kind, error: message })).into_response()
    }
}
