//! HTTP API for the Scriptorium service.
//!
//! This module provides the REST API endpoints for:
//! - Health monitoring
//! - Document management and segmentation lifecycle
//! - Embedding jobs and consistency
//! - Similarity search
//! - Per-user embedding settings

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::service::ScriptoriumService;

pub mod documents;
pub mod embeddings;
pub mod search;
pub mod settings;

use documents::{
    cancel_document_handler, delete_document_handler, get_document_handler,
    list_documents_handler, retry_document_handler, upload_document_handler,
};
use embeddings::{
    cancel_embedding_handler, check_consistency_handler, delete_embeddings_handler,
    get_embedding_job_handler, reembed_handler, start_embedding_handler,
};
use search::search_handler;
use settings::{get_settings_handler, test_settings_handler, update_settings_handler};

/// Application state
pub struct AppState {
    pub service: Arc<ScriptoriumService>,
    pub start_time: Instant,
}

/// Query parameters identifying the requesting user.
///
/// Authentication is handled upstream; handlers trust the caller-supplied
/// user id.
#[derive(Deserialize)]
pub struct UserParams {
    pub user_id: String,
}

/// Build the API router
pub fn router(service: Arc<ScriptoriumService>) -> Router {
    let max_body_size = service.config.storage.max_upload_bytes as usize;

    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Document endpoints - with larger body limit for file uploads
        .route("/documents", get(list_documents_handler))
        .route(
            "/documents",
            post(upload_document_handler).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route("/documents/{id}", get(get_document_handler))
        .route("/documents/{id}", delete(delete_document_handler))
        .route("/documents/{id}/cancel", post(cancel_document_handler))
        .route("/documents/{id}/retry", post(retry_document_handler))
        // Embedding endpoints
        .route("/documents/{id}/embeddings", post(start_embedding_handler))
        .route("/documents/{id}/embeddings", get(get_embedding_job_handler))
        .route(
            "/documents/{id}/embeddings",
            delete(delete_embeddings_handler),
        )
        .route(
            "/documents/{id}/embeddings/cancel",
            post(cancel_embedding_handler),
        )
        .route("/embeddings/consistency", get(check_consistency_handler))
        .route("/embeddings/reembed", post(reembed_handler))
        // Search endpoint
        .route("/search", post(search_handler))
        // Settings endpoints
        .route("/settings", get(get_settings_handler))
        .route("/settings", put(update_settings_handler))
        .route("/settings/test", post(test_settings_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health ===

async fn health_handler(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
}
