//! DocSign API - backend for document signing
//!
//! Provides REST endpoints for:
//! - Document upload, listing and deletion
//! - Signature placement, acceptance, rejection and removal
//! - Finalization into a signed artifact, plus its audit trail
//! - Static delivery of uploads and artifacts under `/files`

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let files = ServeDir::new(&state.storage_dir);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Documents
        .route(
            "/docs",
            get(handlers::list_documents).post(handlers::upload_document),
        )
        .route("/docs/pending", get(handlers::list_pending))
        .route("/docs/signed", get(handlers::list_signed))
        .route("/docs/rejected", get(handlers::list_rejected))
        .route(
            "/docs/:id",
            get(handlers::get_document).delete(handlers::delete_document),
        )
        .route("/docs/:id/audit", get(handlers::get_audit_trail))
        // Signatures
        .route("/signature/file/:id", get(handlers::list_placements))
        .route("/signature/place", post(handlers::place_signature))
        .route("/signature/accept/:id", post(handlers::accept_placement))
        .route("/signature/finalize", post(handlers::finalize_document))
        .route("/signature/reject/:id", post(handlers::reject_placement))
        .route("/signature/remove/:id", delete(handlers::remove_placement))
        // Uploaded and signed files
        .nest_service("/files", files)
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
