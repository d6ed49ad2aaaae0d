//! Similarity search API endpoint.

use axum::{Json, extract::State};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ServiceError;
use crate::service::SearchOutcome;

use super::AppState;

fn default_top_k() -> usize {
    5
}

/// Search request body
#[derive(Deserialize)]
pub struct SearchRequest {
    pub user_id: String,
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Restrict results to one document
    pub file_id: Option<String>,
}

/// Search a user's indexed documents.
///
/// The response is either ranked hits or a consistency warning; callers
/// must inspect the `kind` discriminator.
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchOutcome>, ServiceError> {
    if request.query.trim().is_empty() {
        return Err(ServiceError::InvalidRequest {
            message: "Query text must not be empty".to_string(),
        });
    }

    let outcome = state
        .service
        .search(
            &request.user_id,
            &request.query,
            request.top_k,
            request.file_id.as_deref(),
        )
        .await?;

    Ok(Json(outcome))
}
