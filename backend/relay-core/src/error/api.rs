use common::ErrorLocation;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::warn;
use serde_json::json;
use thiserror::Error as ThisError;

/// Request-level failures of the HTTP surface.
///
/// Each variant renders the exact body shape its endpoint has always
/// returned; `BatchValidation` uses the bare `{error}` shape of
/// `/send-messages`.
#[derive(Debug, ThisError)]
pub enum ApiError {
    #[error("Validation Error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },

    #[error("Batch Validation Error: {message} {location}")]
    BatchValidation {
        message: String,
        location: ErrorLocation,
    },

    #[error("Request Failed Error: {message}: {error} {location}")]
    Failed {
        message: String,
        error: String,
        location: ErrorLocation,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("{self}");

        match self {
            ApiError::Validation { message, .. } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": message })),
            )
                .into_response(),
            ApiError::BatchValidation { message, .. } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": message })),
            )
                .into_response(),
            ApiError::Failed { message, error, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": message, "error": error })),
            )
                .into_response(),
        }
    }
}
