//! JSON error responses for the HTTP API.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rag_core::RetrievalError;
use rag_drift::DriftError;
use serde_json::json;

/// API error with status code and message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, code: "bad_request", message: msg.into() }
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, code: "internal_error", message: msg.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        let status = match &err {
            RetrievalError::Validation(_) => StatusCode::BAD_REQUEST,
            RetrievalError::Embedding(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RetrievalError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RetrievalError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RetrievalError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, code: err.kind(), message: err.to_string() }
    }
}

impl From<DriftError> for ApiError {
    fn from(err: DriftError) -> Self {
        match &err {
            DriftError::InvalidSuite(_) | DriftError::Parse { .. } => ApiError::bad_request(err.to_string()),
            _ => ApiError::internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
