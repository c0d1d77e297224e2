//! Client-facing error taxonomy.
//!
//! Every error leaving the gateway is JSON with at least an `error` field.
//! Reasons are short classifications; they never carry secrets, URLs with
//! credentials, or stack traces.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Error string for an unmatched route with fallback disabled.
pub const NO_LOCAL_HANDLER: &str = "No local handler for this endpoint";

/// Error string for a local handler fault.
pub const LOCAL_HANDLER_ERROR: &str = "Local handler error";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("No local handler for this endpoint")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Local handler error: {0}")]
    HandlerFault(String),

    #[error("Remote fallback unavailable: {0}")]
    RemoteUnavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::HandlerFault(_) | ApiError::RemoteUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            ApiError::NotFound => json!({ "error": NO_LOCAL_HANDLER }),
            ApiError::Unauthorized => json!({ "error": "Unauthorized" }),
            ApiError::Forbidden(msg) | ApiError::BadRequest(msg) => json!({ "error": msg }),
            ApiError::Unprocessable(msg) => json!({ "error": msg, "valid": false, "message": msg }),
            ApiError::PayloadTooLarge => json!({ "error": "Request body too large" }),
            ApiError::HandlerFault(reason) => {
                json!({ "error": LOCAL_HANDLER_ERROR, "reason": reason })
            }
            ApiError::RemoteUnavailable(reason) => {
                json!({ "error": "Remote fallback unavailable", "reason": reason })
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_response(self.status(), self.body())
    }
}

/// Build a JSON response with an explicit status.
pub fn json_response(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

/// Shorthand for `{error: message}` with the given status.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    json_response(status, json!({ "error": message.into() }))
}
