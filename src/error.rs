//! Error types for the Gutter server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::split::{LabelError, OracleError, SplitError};

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Split error: {0}")]
    Split(#[from] SplitError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<LabelError> for AppError {
    fn from(err: LabelError) -> Self {
        match err {
            LabelError::Features(e) => AppError::Split(e),
            LabelError::Oracle(e) => AppError::Oracle(e),
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Split(e) => match e {
                SplitError::EmptyBuffer { .. }
                | SplitError::DimensionMismatch { .. }
                | SplitError::ImageDecode(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_image", e.to_string())
                }
                SplitError::InsufficientData { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "insufficient_data",
                    e.to_string(),
                ),
                SplitError::InvalidModel(_) => {
                    (StatusCode::CONFLICT, "invalid_model", e.to_string())
                }
                SplitError::Worker(_) => {
                    tracing::error!("Worker error: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal_error",
                        "An internal error occurred".to_string(),
                    )
                }
            },
            AppError::Oracle(e) => {
                tracing::warn!("Oracle error: {}", e);
                match e {
                    OracleError::ProviderNotAvailable(_) => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "oracle_unavailable",
                        e.to_string(),
                    ),
                    OracleError::ApiError(_) | OracleError::MalformedResponse(_) => {
                        (StatusCode::BAD_GATEWAY, "oracle_error", e.to_string())
                    }
                }
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "Database error".to_string(),
                )
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "encoding_error",
                    "Failed to encode stored record".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
