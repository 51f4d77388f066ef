//! API error types
//!
//! Conversion from internal failures to HTTP responses. Query failures map
//! to a 500 with a generic body - the real error is logged server-side with
//! a request id, never leaked to the dashboard.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::storage::StoreError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Storage/query layer failure
    #[error("query error: {0}")]
    Store(#[from] StoreError),

    /// Listener / IO failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "QUERY_ERROR",
                "database query error",
            ),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", "io error"),
        };

        let request_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            request_id = %request_id,
            error_code = %code,
            error_message = %self,
            "API error occurred"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
