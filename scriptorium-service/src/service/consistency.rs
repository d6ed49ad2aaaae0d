//! Embedding consistency checking.
//!
//! A document is consistent when the (provider, model) it was embedded with
//! matches the user's current settings. Inconsistent documents live in a
//! different embedding space and cannot be meaningfully searched with a
//! query embedded under the current settings.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::{EmbeddingJob, ProviderKind};
use crate::error::{EmbeddingError, ServiceResult};
use crate::service::ScriptoriumService;

/// One completed job whose embedding space differs from current settings
#[derive(Debug, Clone, Serialize)]
pub struct InconsistentFile {
    pub file_id: String,
    pub filename: String,
    pub provider: ProviderKind,
    pub model_name: String,
}

impl InconsistentFile {
    fn from_job(job: &EmbeddingJob) -> Self {
        Self {
            file_id: job.file_id.clone(),
            filename: job.filename.clone(),
            provider: job.provider,
            model_name: job.model_name.clone(),
        }
    }
}

/// Consistency check result for a user's embedded documents
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyReport {
    pub consistent: bool,
    pub current_provider: ProviderKind,
    pub current_model: String,
    pub inconsistent_files: Vec<InconsistentFile>,
}

/// Per-file outcome of a bulk re-embed
#[derive(Debug, Clone, Serialize)]
pub struct ReembedOutcome {
    pub file_id: String,
    pub filename: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScriptoriumService {
    /// Compare completed embedding jobs against the user's current settings.
    ///
    /// Checks one document when `file_id` is given, otherwise all of the
    /// user's completed jobs.
    pub fn check_embedding_consistency(
        &self,
        user_id: &str,
        file_id: Option<&str>,
    ) -> ServiceResult<ConsistencyReport> {
        let settings = self.db.get_embedding_settings(user_id)?.ok_or_else(|| {
            EmbeddingError::SettingsMissing {
                user_id: user_id.to_string(),
            }
        })?;

        let jobs = self.db.list_completed_embedding_jobs(user_id)?;

        let inconsistent_files: Vec<InconsistentFile> = jobs
            .iter()
            .filter(|job| match file_id {
                Some(id) => job.file_id == id,
                None => true,
            })
            .filter(|job| {
                job.provider != settings.provider || job.model_name != settings.model_name
            })
            .map(InconsistentFile::from_job)
            .collect();

        Ok(ConsistencyReport {
            consistent: inconsistent_files.is_empty(),
            current_provider: settings.provider,
            current_model: settings.model_name,
            inconsistent_files,
        })
    }

    /// Re-embed every inconsistent document under the current settings.
    ///
    /// Documents are processed one after another; an individual failure is
    /// collected and the batch continues.
    pub async fn reembed_inconsistent_files(
        self: &Arc<Self>,
        user_id: &str,
    ) -> ServiceResult<Vec<ReembedOutcome>> {
        let report = self.check_embedding_consistency(user_id, None)?;

        if report.inconsistent_files.is_empty() {
            return Ok(Vec::new());
        }

        info!(
            user_id = %user_id,
            count = report.inconsistent_files.len(),
            "Re-embedding inconsistent documents"
        );

        let mut outcomes = Vec::with_capacity(report.inconsistent_files.len());
        for file in report.inconsistent_files {
            let outcome = match self.reembed_file(user_id, &file.file_id).await {
                Ok(()) => ReembedOutcome {
                    file_id: file.file_id,
                    filename: file.filename,
                    success: true,
                    error: None,
                },
                Err(e) => {
                    warn!(doc_id = %file.file_id, error = %e, "Re-embed failed");
                    ReembedOutcome {
                        file_id: file.file_id,
                        filename: file.filename,
                        success: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// Delete and recreate one document's embeddings, waiting for the
    /// pipeline to finish before returning.
    async fn reembed_file(&self, user_id: &str, file_id: &str) -> ServiceResult<()> {
        self.delete_embeddings(user_id, file_id).await?;

        let (_job, segments, client) = self.prepare_embedding(user_id, file_id)?;
        self.run_embedding_pipeline(user_id, file_id, segments, client)
            .await;

        // The pipeline records its own terminal state; surface a failure
        // to the per-file outcome
        if let Some(job) = self.db.get_embedding_job(user_id, file_id)? {
            if let Some(error) = job.error_message {
                if job.status == crate::db::JobStatus::Failed {
                    return Err(crate::error::ServiceError::Internal { message: error });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfig;
    use crate::db::{Database, EmbeddingSettings, JobStatus};
    use chrono::Utc;
    use std::sync::Arc;

    fn test_service() -> ScriptoriumService {
        let config: StaticConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());
        ScriptoriumService::new(db, Arc::new(config)).unwrap()
    }

    fn local_settings(model: &str) -> EmbeddingSettings {
        EmbeddingSettings {
            user_id: "u1".to_string(),
            provider: ProviderKind::Local,
            model_name: model.to_string(),
            api_key: None,
            updated_at: Utc::now(),
        }
    }

    fn job(file_id: &str, status: JobStatus, provider: ProviderKind, model: &str) -> EmbeddingJob {
        EmbeddingJob {
            user_id: "u1".to_string(),
            file_id: file_id.to_string(),
            filename: format!("{file_id}.pdf"),
            status,
            total_chunks: 3,
            completed_chunks: 3,
            provider,
            model_name: model.to_string(),
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_flags_jobs_in_other_embedding_spaces() {
        let service = test_service();
        service
            .db
            .set_embedding_settings(&local_settings("nomic-embed-text"))
            .unwrap();

        // f1 matches current settings; f2 differs by model, f3 by provider
        for j in [
            job("f1", JobStatus::Completed, ProviderKind::Local, "nomic-embed-text"),
            job("f2", JobStatus::Completed, ProviderKind::Local, "all-minilm"),
            job("f3", JobStatus::Completed, ProviderKind::Remote, "nomic-embed-text"),
        ] {
            service.db.reset_embedding_job(&j).unwrap();
        }

        let report = service.check_embedding_consistency("u1", None).unwrap();
        assert!(!report.consistent);
        assert_eq!(report.current_provider, ProviderKind::Local);
        assert_eq!(report.current_model, "nomic-embed-text");

        let flagged: Vec<&str> = report
            .inconsistent_files
            .iter()
            .map(|f| f.file_id.as_str())
            .collect();
        assert_eq!(flagged, vec!["f2", "f3"]);
    }

    #[test]
    fn test_file_scoped_check_ignores_other_files() {
        let service = test_service();
        service
            .db
            .set_embedding_settings(&local_settings("nomic-embed-text"))
            .unwrap();
        service
            .db
            .reset_embedding_job(&job(
                "f1",
                JobStatus::Completed,
                ProviderKind::Local,
                "nomic-embed-text",
            ))
            .unwrap();
        service
            .db
            .reset_embedding_job(&job(
                "f2",
                JobStatus::Completed,
                ProviderKind::Local,
                "all-minilm",
            ))
            .unwrap();

        let report = service
            .check_embedding_consistency("u1", Some("f1"))
            .unwrap();
        assert!(report.consistent);
        assert!(report.inconsistent_files.is_empty());

        let report = service
            .check_embedding_consistency("u1", Some("f2"))
            .unwrap();
        assert!(!report.consistent);
        assert_eq!(report.inconsistent_files.len(), 1);
        assert_eq!(report.inconsistent_files[0].filename, "f2.pdf");
    }

    #[test]
    fn test_unfinished_jobs_are_not_flagged() {
        let service = test_service();
        service
            .db
            .set_embedding_settings(&local_settings("nomic-embed-text"))
            .unwrap();
        service
            .db
            .reset_embedding_job(&job(
                "f1",
                JobStatus::Processing,
                ProviderKind::Local,
                "all-minilm",
            ))
            .unwrap();

        // Only completed jobs hold indexed vectors worth comparing
        let report = service.check_embedding_consistency("u1", None).unwrap();
        assert!(report.consistent);
    }
}
