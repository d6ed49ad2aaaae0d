//! Document API endpoints.
//!
//! Handlers for upload, listing, status, delete, cancel, and retry.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
};
use serde::Serialize;
use std::sync::Arc;

use crate::db::Document;
use crate::error::ServiceError;

use super::{AppState, UserParams};

/// Response for delete operations
#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// List a user's documents
pub async fn list_documents_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserParams>,
) -> Result<Json<Vec<Document>>, ServiceError> {
    let documents = state.service.list_documents(&params.user_id)?;
    Ok(Json(documents))
}

/// Upload a new document
pub async fn upload_document_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Document>, ServiceError> {
    let mut file_data: Option<(Vec<u8>, String)> = None;
    let mut user_id: Option<String> = None;
    let mut language = "en".to_string();
    let mut ocr = false;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("document").to_string();
                let data = field.bytes().await.map_err(|e| {
                    ServiceError::InvalidRequest {
                        message: e.to_string(),
                    }
                })?;
                file_data = Some((data.to_vec(), filename));
            }
            "user_id" => {
                user_id = Some(field.text().await.map_err(|e| {
                    ServiceError::InvalidRequest {
                        message: e.to_string(),
                    }
                })?);
            }
            "language" => {
                let value = field.text().await.map_err(|e| {
                    ServiceError::InvalidRequest {
                        message: e.to_string(),
                    }
                })?;
                if !value.is_empty() {
                    language = value;
                }
            }
            "ocr" => {
                let value = field.text().await.map_err(|e| {
                    ServiceError::InvalidRequest {
                        message: e.to_string(),
                    }
                })?;
                ocr = matches!(value.as_str(), "true" | "1" | "yes");
            }
            _ => {}
        }
    }

    let (data, filename) = file_data.ok_or_else(|| ServiceError::InvalidRequest {
        message: "No file provided".to_string(),
    })?;
    let user_id = user_id.ok_or_else(|| ServiceError::InvalidRequest {
        message: "No user_id provided".to_string(),
    })?;

    let document = state
        .service
        .upload_document(&user_id, &filename, &data, &language, ocr)?;

    Ok(Json(document))
}

/// Get a specific document by ID
pub async fn get_document_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<UserParams>,
) -> Result<Json<Document>, ServiceError> {
    let document = state.service.get_document_for_user(&params.user_id, &id)?;
    Ok(Json(document))
}

/// Delete a document and all derived data
pub async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<UserParams>,
) -> Result<Json<DeleteResponse>, ServiceError> {
    let deleted = state.service.delete_document(&params.user_id, &id).await?;

    if deleted {
        Ok(Json(DeleteResponse {
            success: true,
            message: "Document deleted".to_string(),
        }))
    } else {
        Err(ServiceError::DocumentNotFound { document_id: id })
    }
}

/// Cancel a waiting document
pub async fn cancel_document_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<UserParams>,
) -> Result<Json<Document>, ServiceError> {
    let document = state.service.cancel_document(&params.user_id, &id)?;
    Ok(Json(document))
}

/// Re-enqueue a failed or completed document
pub async fn retry_document_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<UserParams>,
) -> Result<Json<Document>, ServiceError> {
    let document = state.service.retry_document(&params.user_id, &id)?;
    Ok(Json(document))
}
