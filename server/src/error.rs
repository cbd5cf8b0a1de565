//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use larder_engine::KeyConflict;
use serde::Serialize;

use crate::store::StoreError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Engine error: {0}")]
    Engine(#[from] larder_engine::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized(&'static str),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    conflicts: Vec<KeyConflict>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut conflicts = Vec::new();

        let (status, error_message, details) = match self {
            AppError::Store(e) => {
                tracing::error!("Store error: {:?}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "Entity store unavailable".to_string(),
                    Some(e.to_string()),
                )
            }
            AppError::Engine(larder_engine::Error::Conflicts(found)) => {
                tracing::warn!("Rejected import with {} key conflict(s)", found.len());
                for conflict in &found {
                    tracing::warn!("  {} records claim {}", conflict.claimants(), conflict);
                }
                let message = format!("{} conflicting key(s) across import batches", found.len());
                conflicts = found;
                (StatusCode::CONFLICT, message, None)
            }
            AppError::Engine(e) => {
                tracing::warn!("Engine error: {:?}", e);
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string(), None)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Unauthorized(reason) => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized".to_string(),
                Some(reason.to_string()),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
            conflicts,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
