use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream model error")]
    UpstreamError(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::VectorStoreNotFound(msg) => Self::NotFound(msg),
            AppError::Validation(msg) | AppError::Extraction(msg) => Self::ValidationError(msg),
            AppError::Embedding(_) | AppError::Generation(_) => {
                tracing::error!(kind = err.kind(), "Model provider error: {:?}", err);
                Self::UpstreamError("Model provider request failed".to_string())
            }
            _ => {
                tracing::error!(kind = err.kind(), "Internal error: {:?}", err);
                Self::InternalError("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InternalError(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            Self::ValidationError(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::UpstreamError(message) => (StatusCode::BAD_GATEWAY, message),
        };

        let error_response = ErrorResponse {
            success: false,
            error: message,
            status: "error".to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    success: bool,
    error: String,
    status: String,
}
