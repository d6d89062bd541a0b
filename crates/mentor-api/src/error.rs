//! API error type and JSON error body.
//!
//! Every failure leaves the server as `{error, message}` with a status code
//! derived from the underlying error kind.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use mentor_agents::AgentError;
use mentor_chat::ChatError;
use mentor_core::error::MentorError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code, e.g. "bad_request".
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400: malformed or invalid input.
    BadRequest(String),
    /// 403: the access policy denied the session.
    Forbidden(String),
    /// 404: unknown resource.
    NotFound(String),
    /// 413: request body over the configured limit.
    PayloadTooLarge(String),
    /// 500: unexpected failure.
    Internal(String),
    /// 503: store, remote service or capability unavailable.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<MentorError> for ApiError {
    fn from(err: MentorError) -> Self {
        match &err {
            MentorError::Validation(msg) => ApiError::BadRequest(msg.clone()),
            MentorError::NotFound(msg) => ApiError::NotFound(msg.clone()),
            MentorError::Connectivity(_)
            | MentorError::Timeout(_)
            | MentorError::Upstream { .. }
            | MentorError::DimensionMismatch { .. } => ApiError::ServiceUnavailable(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Core(e) => e.into(),
            e if e.is_client_error() => ApiError::BadRequest(e.to_string()),
            e => ApiError::ServiceUnavailable(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(rejection.body_text()),
            _ => ApiError::BadRequest(rejection.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Denied(reason) => ApiError::Forbidden(reason),
            ChatError::Core(e) => e.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}
