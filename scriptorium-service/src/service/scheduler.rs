//! Document processing scheduler.
//!
//! Segmentation runs against a shared, expensive external service, so at
//! most one document is segmented at a time system-wide. Uploads enqueue as
//! waiting; a kicked queue claims the oldest waiting document, runs
//! segmentation, records the terminal state, and then claims the next one.
//! That self-chaining drains the queue without an external poller.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::{Document, DocumentStatus};
use crate::error::{ServiceError, ServiceResult};
use crate::service::ScriptoriumService;

/// Error recorded when a user cancels a waiting document
const CANCELLED_MESSAGE: &str = "Cancelled by user";

/// Error recorded for documents orphaned in processing by a restart
const ORPHANED_MESSAGE: &str = "Processing interrupted by service restart";

impl ScriptoriumService {
    /// Kick the segmentation queue.
    ///
    /// Safe to call at any time: the claim is atomic and refuses to admit
    /// while another document is processing, so concurrent kicks collapse
    /// into one running drain loop.
    pub fn kick_queue(self: &Arc<Self>) {
        let service = self.clone();
        self.jobs.submit(
            format!("segmentation:{}", uuid::Uuid::new_v4()),
            async move {
                service.drain_segmentation_queue().await;
            },
        );
    }

    async fn drain_segmentation_queue(self: Arc<Self>) {
        loop {
            let doc = match self.db.claim_next_waiting() {
                Ok(Some(doc)) => doc,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Failed to claim next waiting document");
                    break;
                }
            };

            info!(doc_id = %doc.id, filename = %doc.filename, "Segmentation started");

            match self.run_segmentation(&doc).await {
                Ok(segment_count) => {
                    if let Err(e) = self.db.mark_document_completed(&doc.id) {
                        // Recorded in an independent write; losing it would
                        // wedge the single-flight queue
                        error!(doc_id = %doc.id, error = %e, "Failed to mark document completed");
                        self.record_document_failure(&doc.id, &e.to_string());
                        continue;
                    }

                    info!(
                        doc_id = %doc.id,
                        segments = segment_count,
                        "Segmentation completed"
                    );

                    // Best-effort: a missing chat session never fails the document
                    if let Err(e) = self.db.insert_chat_session(
                        &doc.user_id,
                        &doc.id,
                        &format!("Chat about {}", doc.filename),
                    ) {
                        warn!(doc_id = %doc.id, error = %e, "Failed to create initial chat session");
                    }
                }
                Err(e) => {
                    warn!(doc_id = %doc.id, error = %e, "Segmentation failed");
                    self.record_document_failure(&doc.id, &e.to_string());
                }
            }
            // Loop continues: completion always admits the next waiting document
        }
    }

    /// Run the segmentation step for one claimed document
    async fn run_segmentation(&self, doc: &Document) -> ServiceResult<usize> {
        let content = self
            .segments
            .read_original(&doc.user_id, &doc.id, &doc.filename)?;

        let (content, filename) = if doc.ocr {
            let ocr_bytes = self
                .segmentation
                .ocr(content, &doc.filename, &doc.language)
                .await?;
            self.segments
                .save_ocr(&doc.user_id, &doc.id, &doc.filename, &ocr_bytes)?;
            (ocr_bytes.to_vec(), format!("ocr_{}", doc.filename))
        } else {
            (content, doc.filename.clone())
        };

        let segments = self.segmentation.extract(content, &filename).await?;
        self.segments
            .save_segments(&doc.user_id, &doc.id, &doc.filename, &segments)?;

        Ok(segments.len())
    }

    /// Record a document failure. Failure to persist the failure is logged
    /// and swallowed so the drain loop always reaches the next document.
    fn record_document_failure(&self, doc_id: &str, message: &str) {
        if let Err(e) = self.db.mark_document_failed(doc_id, message) {
            error!(doc_id = %doc_id, error = %e, "Failed to record document failure");
        }
    }

    /// Cancel a waiting document.
    ///
    /// Only valid before the document was admitted; an in-flight
    /// segmentation job cannot be interrupted.
    pub fn cancel_document(&self, user_id: &str, doc_id: &str) -> ServiceResult<Document> {
        self.get_document_for_user(user_id, doc_id)?;

        // Conditional write: the drain loop may admit the document between
        // the ownership read and this cancel, and a claimed document must
        // not be failed out from under the running segmentation
        if !self.db.cancel_waiting_document(doc_id, CANCELLED_MESSAGE)? {
            let doc = self.get_document_for_user(user_id, doc_id)?;
            return Err(ServiceError::InvalidStatus {
                message: format!(
                    "Only waiting documents can be cancelled (current status: {})",
                    doc.status.as_str()
                ),
            });
        }

        self.segments.remove_document(user_id, doc_id);

        info!(doc_id = %doc_id, "Document cancelled");
        self.get_document_for_user(user_id, doc_id)
    }

    /// Re-enqueue a failed or completed document for segmentation
    pub fn retry_document(self: &Arc<Self>, user_id: &str, doc_id: &str) -> ServiceResult<Document> {
        let doc = self.get_document_for_user(user_id, doc_id)?;

        if !matches!(
            doc.status,
            DocumentStatus::Failed | DocumentStatus::Completed
        ) {
            return Err(ServiceError::InvalidStatus {
                message: format!(
                    "Only failed or completed documents can be retried (current status: {})",
                    doc.status.as_str()
                ),
            });
        }

        if !self
            .segments
            .original_exists(&doc.user_id, &doc.id, &doc.filename)
        {
            return Err(ServiceError::InvalidRequest {
                message: "Original file no longer exists on disk".to_string(),
            });
        }

        self.db.reset_document_for_retry(doc_id)?;
        info!(doc_id = %doc_id, "Document re-enqueued for segmentation");

        self.kick_queue();
        self.get_document_for_user(user_id, doc_id)
    }

    /// Startup recovery: fail documents orphaned in processing by a crash
    /// or restart. The caller kicks the queue afterwards.
    pub fn recover_orphaned_documents(&self) -> ServiceResult<usize> {
        let recovered = self.db.recover_orphaned_processing(ORPHANED_MESSAGE)?;
        if recovered > 0 {
            warn!(count = recovered, "Recovered documents orphaned in processing");
        }
        Ok(recovered)
    }
}
