//! Document scheduling and CRUD operations.
//!
//! This module contains document-related database operations including
//! insert, get, list, delete, and the scheduler status transitions.

use rusqlite::{OptionalExtension, params};

use super::Database;
use super::models::{Document, DocumentStatus};
use crate::error::{DatabaseError, ServiceResult};

const DOCUMENT_COLUMNS: &str = "id, user_id, filename, file_size, language, ocr, status, \
     error_message, created_at, processed_at";

impl Database {
    /// Insert a new document
    pub fn insert_document(&self, doc: &Document) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            INSERT INTO documents (id, user_id, filename, file_size, language, ocr, status, error_message, created_at, processed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                doc.id,
                doc.user_id,
                doc.filename,
                doc.file_size as i64,
                doc.language,
                doc.ocr as i64,
                doc.status.as_str(),
                doc.error_message,
                doc.created_at.to_rfc3339(),
                doc.processed_at.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Get a document by ID
    pub fn get_document(&self, id: &str) -> ServiceResult<Option<Document>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
            params![id],
            Document::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// List a user's documents, newest first
    pub fn list_documents(&self, user_id: &str) -> ServiceResult<Vec<Document>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE user_id = ?1 ORDER BY created_at DESC"
            ))
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![user_id], Document::from_row)
            .map_err(DatabaseError::Query)?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row.map_err(DatabaseError::Query)?);
        }

        Ok(docs)
    }

    /// Atomically claim the next document for segmentation.
    ///
    /// Enforces the system-wide single-flight invariant: returns `None` when
    /// any document is already processing. Otherwise the oldest waiting
    /// document (FIFO by creation time) is transitioned to processing and
    /// returned. The check and the transition happen under the same
    /// connection lock, so two concurrent callers can never both claim.
    pub fn claim_next_waiting(&self) -> ServiceResult<Option<Document>> {
        let conn = self.conn.lock().unwrap();

        let processing: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE status = 'processing'",
                [],
                |row| row.get(0),
            )
            .map_err(DatabaseError::Query)?;

        if processing > 0 {
            return Ok(None);
        }

        let doc = conn
            .query_row(
                &format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE status = 'waiting' \
                     ORDER BY created_at ASC LIMIT 1"
                ),
                [],
                Document::from_row,
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        let Some(mut doc) = doc else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE documents SET status = 'processing' WHERE id = ?1",
            params![doc.id],
        )
        .map_err(DatabaseError::Query)?;

        doc.status = DocumentStatus::Processing;
        Ok(Some(doc))
    }

    /// Mark a document's segmentation as completed
    pub fn mark_document_completed(&self, id: &str) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "UPDATE documents SET status = 'completed', error_message = NULL, \
                 processed_at = ?1 WHERE id = ?2",
                params![chrono::Utc::now().to_rfc3339(), id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Record a document failure with the captured error message
    pub fn mark_document_failed(&self, id: &str, error_message: &str) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "UPDATE documents SET status = 'failed', error_message = ?1 WHERE id = ?2",
                params![error_message, id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Cancel a waiting document, recording the fixed cancel message.
    ///
    /// Conditional on status: a document the drain loop admitted between
    /// the caller's read and this write is left untouched, and false is
    /// returned.
    pub fn cancel_waiting_document(&self, id: &str, error_message: &str) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "UPDATE documents SET status = 'failed', error_message = ?1 \
                 WHERE id = ?2 AND status = 'waiting'",
                params![error_message, id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Reset a document to waiting for a retry, clearing error and
    /// processed timestamps
    pub fn reset_document_for_retry(&self, id: &str) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "UPDATE documents SET status = 'waiting', error_message = NULL, \
                 processed_at = NULL WHERE id = ?1",
                params![id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Force any documents stuck in processing to failed.
    ///
    /// Called once at startup: a processing document at boot was orphaned by
    /// a crash or restart, since segmentation never survives the process.
    pub fn recover_orphaned_processing(&self, error_message: &str) -> ServiceResult<usize> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "UPDATE documents SET status = 'failed', error_message = ?1 \
                 WHERE status = 'processing'",
                params![error_message],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows)
    }

    /// Delete a document row
    pub fn delete_document(&self, id: &str) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id])
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, Document, DocumentStatus};
    use chrono::{Duration, Utc};

    fn test_document(id: &str, created_offset_secs: i64) -> Document {
        Document {
            id: id.to_string(),
            user_id: "u1".to_string(),
            filename: format!("{id}.pdf"),
            file_size: 1024,
            language: "en".to_string(),
            ocr: false,
            status: DocumentStatus::Waiting,
            error_message: None,
            created_at: Utc::now() + Duration::seconds(created_offset_secs),
            processed_at: None,
        }
    }

    #[test]
    fn test_claim_is_fifo_by_creation_time() {
        let db = Database::open_in_memory().unwrap();
        db.insert_document(&test_document("later", 10)).unwrap();
        db.insert_document(&test_document("earlier", 0)).unwrap();

        let claimed = db.claim_next_waiting().unwrap().unwrap();
        assert_eq!(claimed.id, "earlier");
        assert_eq!(claimed.status, DocumentStatus::Processing);
    }

    #[test]
    fn test_single_flight_claim() {
        let db = Database::open_in_memory().unwrap();
        db.insert_document(&test_document("a", 0)).unwrap();
        db.insert_document(&test_document("b", 1)).unwrap();

        // First claim succeeds, second is blocked while "a" is processing
        assert!(db.claim_next_waiting().unwrap().is_some());
        assert!(db.claim_next_waiting().unwrap().is_none());

        // Completion releases the queue
        db.mark_document_completed("a").unwrap();
        let next = db.claim_next_waiting().unwrap().unwrap();
        assert_eq!(next.id, "b");
    }

    #[test]
    fn test_failure_releases_queue() {
        let db = Database::open_in_memory().unwrap();
        db.insert_document(&test_document("a", 0)).unwrap();
        db.insert_document(&test_document("b", 1)).unwrap();

        db.claim_next_waiting().unwrap().unwrap();
        db.mark_document_failed("a", "segmentation timed out").unwrap();

        let failed = db.get_document("a").unwrap().unwrap();
        assert_eq!(failed.status, DocumentStatus::Failed);
        assert_eq!(
            failed.error_message.as_deref(),
            Some("segmentation timed out")
        );

        assert!(db.claim_next_waiting().unwrap().is_some());
    }

    #[test]
    fn test_cancel_only_from_waiting() {
        let db = Database::open_in_memory().unwrap();
        db.insert_document(&test_document("a", 0)).unwrap();
        db.insert_document(&test_document("b", 1)).unwrap();
        db.claim_next_waiting().unwrap().unwrap();

        // "a" was admitted; a racing cancel must not fail it mid-segmentation
        assert!(!db.cancel_waiting_document("a", "Cancelled by user").unwrap());
        let doc = db.get_document("a").unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Processing);

        assert!(db.cancel_waiting_document("b", "Cancelled by user").unwrap());
        let doc = db.get_document("b").unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(doc.error_message.as_deref(), Some("Cancelled by user"));
    }

    #[test]
    fn test_retry_clears_error_and_processed_at() {
        let db = Database::open_in_memory().unwrap();
        db.insert_document(&test_document("a", 0)).unwrap();
        db.claim_next_waiting().unwrap();
        db.mark_document_failed("a", "boom").unwrap();

        assert!(db.reset_document_for_retry("a").unwrap());

        let doc = db.get_document("a").unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Waiting);
        assert!(doc.error_message.is_none());
        assert!(doc.processed_at.is_none());
    }

    #[test]
    fn test_orphan_recovery() {
        let db = Database::open_in_memory().unwrap();
        db.insert_document(&test_document("a", 0)).unwrap();
        db.claim_next_waiting().unwrap();

        let recovered = db
            .recover_orphaned_processing("interrupted by restart")
            .unwrap();
        assert_eq!(recovered, 1);

        let doc = db.get_document("a").unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(
            doc.error_message.as_deref(),
            Some("interrupted by restart")
        );
    }
}
