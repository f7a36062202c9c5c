//! Error types for DocSign API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docsign_core::DocsignError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing caller identity")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Signing(#[from] DocsignError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        ApiError::Signing(DocsignError::NotFound(what.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing X-User-Email header".to_string(),
            ),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "validation", msg.clone()),
            ApiError::Signing(e) => {
                let status = match e {
                    DocsignError::Validation(_) => StatusCode::BAD_REQUEST,
                    DocsignError::InvalidState(_) | DocsignError::Conflict(_) => {
                        StatusCode::CONFLICT
                    }
                    DocsignError::NotFound(_) => StatusCode::NOT_FOUND,
                    DocsignError::Transport(_) => StatusCode::BAD_GATEWAY,
                    DocsignError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                };
                let message = match e {
                    DocsignError::Validation(m)
                    | DocsignError::InvalidState(m)
                    | DocsignError::Conflict(m)
                    | DocsignError::Transport(m)
                    | DocsignError::NotFound(m) => m.clone(),
                    DocsignError::Timeout(_) => e.to_string(),
                };
                (status, e.kind(), message)
            }
            ApiError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Database error".to_string(),
                )
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
            "kind": kind,
        }));

        (status, body).into_response()
    }
}
