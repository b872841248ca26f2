//! API error types and JSON error response formatting.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use quorum_core::QuorumError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    pub message: String,
}

/// Body of a failed upload.
#[derive(Debug, Serialize)]
pub struct UploadFailureBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 503 Service Unavailable - backing service not reachable.
    ServiceUnavailable(String),
    /// 400 with the upload failure body.
    Upload { error: String, file: Option<String> },
}

impl ApiError {
    pub fn upload(error: impl Into<String>, file: Option<String>) -> Self {
        ApiError::Upload {
            error: error.into(),
            file,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
            ApiError::Upload { error, file } => {
                let body = UploadFailureBody {
                    success: false,
                    error,
                    file,
                };
                return (StatusCode::BAD_REQUEST, Json(body)).into_response();
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<QuorumError> for ApiError {
    fn from(err: QuorumError) -> Self {
        match &err {
            QuorumError::Config(msg) => ApiError::BadRequest(msg.clone()),
            QuorumError::Retrieval(msg) => ApiError::ServiceUnavailable(msg.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<quorum_vector::RetrievalError> for ApiError {
    fn from(err: quorum_vector::RetrievalError) -> Self {
        if err.is_transient() {
            ApiError::ServiceUnavailable(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}
