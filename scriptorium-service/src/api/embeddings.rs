//! Embedding job API endpoints.
//!
//! Handlers for starting, polling, cancelling, and deleting embedding jobs,
//! plus consistency checking and bulk re-embedding.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::EmbeddingJob;
use crate::error::ServiceError;
use crate::service::{ConsistencyReport, ReembedOutcome};

use super::{AppState, UserParams};

/// Response wrapping a job with its derived progress fraction
#[derive(Serialize)]
pub struct EmbeddingJobResponse {
    #[serde(flatten)]
    pub job: EmbeddingJob,
    pub progress: f64,
}

impl From<EmbeddingJob> for EmbeddingJobResponse {
    fn from(job: EmbeddingJob) -> Self {
        let progress = job.progress();
        Self { job, progress }
    }
}

/// Response for operations that only report success
#[derive(Serialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

/// Consistency check query parameters
#[derive(Deserialize)]
pub struct ConsistencyParams {
    pub user_id: String,
    pub file_id: Option<String>,
}

/// Start embedding a document's segments
pub async fn start_embedding_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<UserParams>,
) -> Result<Json<EmbeddingJobResponse>, ServiceError> {
    let job = state.service.start_embedding(&params.user_id, &id)?;
    Ok(Json(job.into()))
}

/// Poll an embedding job's status and progress
pub async fn get_embedding_job_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<UserParams>,
) -> Result<Json<EmbeddingJobResponse>, ServiceError> {
    let job = state.service.get_embedding_job(&params.user_id, &id)?;
    Ok(Json(job.into()))
}

/// Cancel a processing embedding job
pub async fn cancel_embedding_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<UserParams>,
) -> Result<Json<AckResponse>, ServiceError> {
    state.service.cancel_embedding(&params.user_id, &id).await?;
    Ok(Json(AckResponse {
        success: true,
        message: "Embedding job cancelled".to_string(),
    }))
}

/// Delete a document's embeddings and job record
pub async fn delete_embeddings_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<UserParams>,
) -> Result<Json<AckResponse>, ServiceError> {
    state.service.delete_embeddings(&params.user_id, &id).await?;
    Ok(Json(AckResponse {
        success: true,
        message: "Embeddings deleted".to_string(),
    }))
}

/// Check embedding consistency against current settings
pub async fn check_consistency_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConsistencyParams>,
) -> Result<Json<ConsistencyReport>, ServiceError> {
    let report = state
        .service
        .check_embedding_consistency(&params.user_id, params.file_id.as_deref())?;
    Ok(Json(report))
}

/// Re-embed all inconsistent documents under current settings
pub async fn reembed_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserParams>,
) -> Result<Json<Vec<ReembedOutcome>>, ServiceError> {
    let outcomes = state
        .service
        .reembed_inconsistent_files(&params.user_id)
        .await?;
    Ok(Json(outcomes))
}
