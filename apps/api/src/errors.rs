use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::extraction::ExtractError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg.clone())
            }
            AppError::Extraction(e) => {
                tracing::warn!("Extraction failed: {e}");
                match e {
                    ExtractError::UnsupportedFormat(_) => (
                        StatusCode::UNSUPPORTED_MEDIA_TYPE,
                        "UNSUPPORTED_FORMAT",
                        e.to_string(),
                    ),
                    ExtractError::EmptyDocument(_) => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "EMPTY_DOCUMENT",
                        e.to_string(),
                    ),
                    ExtractError::MalformedDocument(_) => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "MALFORMED_DOCUMENT",
                        e.to_string(),
                    ),
                }
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
