//! Embedding job tracker operations.
//!
//! One job row exists per (user, document). Starting a new embedding run
//! deletes and recreates the row; progress and terminal states are written
//! through short-lived transactions so status is always observable.

use rusqlite::{OptionalExtension, params};

use super::Database;
use super::models::{EmbeddingJob, JobStatus};
use crate::error::{DatabaseError, ServiceResult};

const JOB_COLUMNS: &str = "user_id, file_id, filename, status, total_chunks, completed_chunks, \
     provider, model_name, error_message, created_at, updated_at";

impl Database {
    /// Replace any prior job for this (user, document) with a fresh one
    pub fn reset_embedding_job(&self, job: &EmbeddingJob) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "DELETE FROM embedding_jobs WHERE user_id = ?1 AND file_id = ?2",
            params![job.user_id, job.file_id],
        )
        .map_err(DatabaseError::Query)?;

        conn.execute(
            r#"
            INSERT INTO embedding_jobs (user_id, file_id, filename, status, total_chunks, completed_chunks, provider, model_name, error_message, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                job.user_id,
                job.file_id,
                job.filename,
                job.status.as_str(),
                job.total_chunks as i64,
                job.completed_chunks as i64,
                job.provider.to_string(),
                job.model_name,
                job.error_message,
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Get the embedding job for a (user, document)
    pub fn get_embedding_job(
        &self,
        user_id: &str,
        file_id: &str,
    ) -> ServiceResult<Option<EmbeddingJob>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!(
                "SELECT {JOB_COLUMNS} FROM embedding_jobs WHERE user_id = ?1 AND file_id = ?2"
            ),
            params![user_id, file_id],
            EmbeddingJob::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Read just the job status (cancellation poll at batch boundaries)
    pub fn get_embedding_job_status(
        &self,
        user_id: &str,
        file_id: &str,
    ) -> ServiceResult<Option<JobStatus>> {
        let conn = self.conn.lock().unwrap();

        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM embedding_jobs WHERE user_id = ?1 AND file_id = ?2",
                params![user_id, file_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        Ok(status.as_deref().map(JobStatus::from_str))
    }

    /// Advance completed_chunks by `delta`, clamped to total_chunks.
    /// Progress is monotonically non-decreasing by construction, and only
    /// a processing job can advance.
    pub fn advance_embedding_progress(
        &self,
        user_id: &str,
        file_id: &str,
        delta: usize,
    ) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE embedding_jobs SET \
             completed_chunks = MIN(total_chunks, completed_chunks + ?1), \
             updated_at = ?2 \
             WHERE user_id = ?3 AND file_id = ?4 AND status = 'processing'",
            params![
                delta as i64,
                chrono::Utc::now().to_rfc3339(),
                user_id,
                file_id
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Mark a job completed with full progress. Terminal states are final:
    /// only a processing job completes, so a cancel that raced the last
    /// batch wins. Returns false when no transition happened.
    pub fn complete_embedding_job(&self, user_id: &str, file_id: &str) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "UPDATE embedding_jobs SET status = 'completed', \
                 completed_chunks = total_chunks, updated_at = ?1 \
                 WHERE user_id = ?2 AND file_id = ?3 AND status = 'processing'",
                params![chrono::Utc::now().to_rfc3339(), user_id, file_id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Mark a job failed with the captured error message. Like completion,
    /// only valid from processing; returns false when the job was already
    /// terminal.
    pub fn fail_embedding_job(
        &self,
        user_id: &str,
        file_id: &str,
        error_message: &str,
    ) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "UPDATE embedding_jobs SET status = 'failed', error_message = ?1, updated_at = ?2 \
                 WHERE user_id = ?3 AND file_id = ?4 AND status = 'processing'",
                params![
                    error_message,
                    chrono::Utc::now().to_rfc3339(),
                    user_id,
                    file_id
                ],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Cancel a job. Only valid while processing; returns false otherwise.
    pub fn cancel_embedding_job(
        &self,
        user_id: &str,
        file_id: &str,
        message: &str,
    ) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "UPDATE embedding_jobs SET status = 'cancelled', error_message = ?1, \
                 updated_at = ?2 \
                 WHERE user_id = ?3 AND file_id = ?4 AND status = 'processing'",
                params![
                    message,
                    chrono::Utc::now().to_rfc3339(),
                    user_id,
                    file_id
                ],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Delete the job row for a (user, document); idempotent
    pub fn delete_embedding_job(&self, user_id: &str, file_id: &str) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "DELETE FROM embedding_jobs WHERE user_id = ?1 AND file_id = ?2",
                params![user_id, file_id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// List a user's completed jobs (consistency checking)
    pub fn list_completed_embedding_jobs(&self, user_id: &str) -> ServiceResult<Vec<EmbeddingJob>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM embedding_jobs \
                 WHERE user_id = ?1 AND status = 'completed' ORDER BY file_id"
            ))
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![user_id], EmbeddingJob::from_row)
            .map_err(DatabaseError::Query)?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row.map_err(DatabaseError::Query)?);
        }

        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, EmbeddingJob, JobStatus, ProviderKind};
    use chrono::Utc;

    fn test_job(file_id: &str, total: usize) -> EmbeddingJob {
        EmbeddingJob {
            user_id: "u1".to_string(),
            file_id: file_id.to_string(),
            filename: format!("{file_id}.pdf"),
            status: JobStatus::Processing,
            total_chunks: total,
            completed_chunks: 0,
            provider: ProviderKind::Local,
            model_name: "nomic-embed-text".to_string(),
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_progress_is_clamped_to_total() {
        let db = Database::open_in_memory().unwrap();
        db.reset_embedding_job(&test_job("f1", 5)).unwrap();

        db.advance_embedding_progress("u1", "f1", 3).unwrap();
        db.advance_embedding_progress("u1", "f1", 3).unwrap();

        let job = db.get_embedding_job("u1", "f1").unwrap().unwrap();
        assert_eq!(job.completed_chunks, 5);
        assert_eq!(job.total_chunks, 5);
    }

    #[test]
    fn test_cancel_only_from_processing() {
        let db = Database::open_in_memory().unwrap();
        db.reset_embedding_job(&test_job("f1", 5)).unwrap();

        assert!(db.cancel_embedding_job("u1", "f1", "Cancelled by user").unwrap());
        // Already cancelled, second cancel is a no-op
        assert!(!db.cancel_embedding_job("u1", "f1", "Cancelled by user").unwrap());

        db.reset_embedding_job(&test_job("f2", 5)).unwrap();
        db.complete_embedding_job("u1", "f2").unwrap();
        assert!(!db.cancel_embedding_job("u1", "f2", "Cancelled by user").unwrap());
    }

    #[test]
    fn test_cancelled_job_is_not_overwritten() {
        let db = Database::open_in_memory().unwrap();
        db.reset_embedding_job(&test_job("f1", 5)).unwrap();
        db.cancel_embedding_job("u1", "f1", "Cancelled by user").unwrap();

        // Late writes from an in-flight pipeline must not resurrect the job
        db.advance_embedding_progress("u1", "f1", 5).unwrap();
        assert!(!db.complete_embedding_job("u1", "f1").unwrap());
        assert!(!db.fail_embedding_job("u1", "f1", "late failure").unwrap());

        let job = db.get_embedding_job("u1", "f1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.completed_chunks, 0);
        assert_eq!(job.error_message.as_deref(), Some("Cancelled by user"));
    }

    #[test]
    fn test_reset_replaces_prior_job() {
        let db = Database::open_in_memory().unwrap();
        let mut job = test_job("f1", 5);
        db.reset_embedding_job(&job).unwrap();
        db.fail_embedding_job("u1", "f1", "provider down").unwrap();

        job.total_chunks = 9;
        db.reset_embedding_job(&job).unwrap();

        let fresh = db.get_embedding_job("u1", "f1").unwrap().unwrap();
        assert_eq!(fresh.status, JobStatus::Processing);
        assert_eq!(fresh.total_chunks, 9);
        assert_eq!(fresh.completed_chunks, 0);
        assert!(fresh.error_message.is_none());
    }

    #[test]
    fn test_completed_jobs_listing() {
        let db = Database::open_in_memory().unwrap();
        db.reset_embedding_job(&test_job("f1", 5)).unwrap();
        db.reset_embedding_job(&test_job("f2", 5)).unwrap();
        db.complete_embedding_job("u1", "f1").unwrap();

        let completed = db.list_completed_embedding_jobs("u1").unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].file_id, "f1");
    }
}
