//! Document upload, listing, and deletion.

use std::sync::Arc;
use tracing::{info, warn};

use crate::db::{Document, DocumentStatus};
use crate::error::{ServiceError, ServiceResult};
use crate::service::ScriptoriumService;

impl ScriptoriumService {
    /// Upload a document and enqueue it for segmentation.
    ///
    /// Saves the file and creates a waiting document record, then kicks the
    /// queue. Clients poll the document status for completion.
    pub fn upload_document(
        self: &Arc<Self>,
        user_id: &str,
        filename: &str,
        content: &[u8],
        language: &str,
        ocr: bool,
    ) -> ServiceResult<Document> {
        let max_size = self.config.storage.max_upload_bytes;
        if content.len() as u64 > max_size {
            return Err(ServiceError::InvalidRequest {
                message: format!(
                    "File too large: {} bytes (max {} bytes)",
                    content.len(),
                    max_size
                ),
            });
        }

        let doc_id = uuid::Uuid::new_v4().to_string();
        self.segments
            .save_original(user_id, &doc_id, filename, content)?;

        let document = Document {
            id: doc_id.clone(),
            user_id: user_id.to_string(),
            filename: filename.to_string(),
            file_size: content.len() as u64,
            language: language.to_string(),
            ocr,
            status: DocumentStatus::Waiting,
            error_message: None,
            created_at: chrono::Utc::now(),
            processed_at: None,
        };

        self.db.insert_document(&document)?;

        info!(
            doc_id = %doc_id,
            filename = %filename,
            ocr = ocr,
            "Document uploaded and queued for segmentation"
        );

        self.kick_queue();
        Ok(document)
    }

    /// List a user's documents
    pub fn list_documents(&self, user_id: &str) -> ServiceResult<Vec<Document>> {
        self.db.list_documents(user_id)
    }

    /// Get a document, enforcing ownership
    pub fn get_document_for_user(&self, user_id: &str, doc_id: &str) -> ServiceResult<Document> {
        let doc = self
            .db
            .get_document(doc_id)?
            .ok_or_else(|| ServiceError::DocumentNotFound {
                document_id: doc_id.to_string(),
            })?;

        // Documents are owned exclusively by their user
        if doc.user_id != user_id {
            return Err(ServiceError::DocumentNotFound {
                document_id: doc_id.to_string(),
            });
        }

        Ok(doc)
    }

    /// Delete a document and everything derived from it: vectors, the
    /// embedding job, on-disk artifacts, and the database row.
    pub async fn delete_document(&self, user_id: &str, doc_id: &str) -> ServiceResult<bool> {
        let doc = self.get_document_for_user(user_id, doc_id)?;

        if let Err(e) = self.delete_embeddings(user_id, doc_id).await {
            warn!(doc_id = %doc_id, error = %e, "Failed to delete embeddings during document delete");
        }

        self.segments.remove_document(user_id, doc_id);
        let deleted = self.db.delete_document(doc_id)?;

        info!(doc_id = %doc_id, filename = %doc.filename, "Document deleted");
        Ok(deleted)
    }
}
