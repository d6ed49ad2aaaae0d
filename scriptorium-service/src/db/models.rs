//! Database model structs.
//!
//! This module contains the data structures for database records.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Lifecycle status for uploaded documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Queued for segmentation, not yet admitted
    Waiting,
    /// Segmentation is running (at most one document system-wide)
    Processing,
    /// Segments extracted and persisted
    Completed,
    /// Segmentation failed or was cancelled by the user
    Failed,
    /// Reserved terminal state
    Cancelled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Waiting => "waiting",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
            DocumentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "waiting" => DocumentStatus::Waiting,
            "processing" => DocumentStatus::Processing,
            "failed" => DocumentStatus::Failed,
            "cancelled" => DocumentStatus::Cancelled,
            _ => DocumentStatus::Completed,
        }
    }
}

/// Status for per-document embedding jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "processing" => JobStatus::Processing,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Completed,
        }
    }
}

/// Embedding provider kind stored with settings and jobs
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderKind {
    /// Hosted embedding API with per-user credentials
    Remote,
    /// Local model server with small context windows
    Local,
}

/// Document record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub file_size: u64,
    pub language: String,
    pub ocr: bool,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl Document {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let file_size: i64 = row.get(3)?;
        let ocr: i64 = row.get(5)?;
        let status_str: String = row.get(6)?;
        let created_at_str: String = row.get(8)?;
        let processed_at_str: Option<String> = row.get(9)?;

        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            filename: row.get(2)?,
            file_size: file_size as u64,
            language: row.get(4)?,
            ocr: ocr != 0,
            status: DocumentStatus::from_str(&status_str),
            error_message: row.get(7)?,
            created_at: parse_timestamp(&created_at_str),
            processed_at: processed_at_str.as_deref().map(parse_timestamp),
        })
    }
}

/// Embedding job record, one per (user, document)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingJob {
    pub user_id: String,
    pub file_id: String,
    pub filename: String,
    pub status: JobStatus,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub provider: ProviderKind,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmbeddingJob {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let status_str: String = row.get(3)?;
        let total_chunks: i64 = row.get(4)?;
        let completed_chunks: i64 = row.get(5)?;
        let provider_str: String = row.get(6)?;
        let created_at_str: String = row.get(9)?;
        let updated_at_str: String = row.get(10)?;

        Ok(Self {
            user_id: row.get(0)?,
            file_id: row.get(1)?,
            filename: row.get(2)?,
            status: JobStatus::from_str(&status_str),
            total_chunks: total_chunks as usize,
            completed_chunks: completed_chunks as usize,
            provider: provider_str.parse().unwrap_or(ProviderKind::Local),
            model_name: row.get(7)?,
            error_message: row.get(8)?,
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }

    /// Completion fraction in [0, 1]
    pub fn progress(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        (self.completed_chunks as f64 / self.total_chunks as f64).min(1.0)
    }
}

/// Per-user embedding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub user_id: String,
    pub provider: ProviderKind,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl EmbeddingSettings {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let provider_str: String = row.get(1)?;
        let updated_at_str: String = row.get(4)?;

        Ok(Self {
            user_id: row.get(0)?,
            provider: provider_str.parse().unwrap_or(ProviderKind::Local),
            model_name: row.get(2)?,
            api_key: row.get(3)?,
            updated_at: parse_timestamp(&updated_at_str),
        })
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_status_round_trip() {
        for status in [
            DocumentStatus::Waiting,
            DocumentStatus::Processing,
            DocumentStatus::Completed,
            DocumentStatus::Failed,
            DocumentStatus::Cancelled,
        ] {
            assert_eq!(DocumentStatus::from_str(status.as_str()), status);
        }
    }

    #[test]
    fn test_provider_kind_strings() {
        assert_eq!(ProviderKind::Remote.to_string(), "remote");
        assert_eq!(ProviderKind::Local.to_string(), "local");
        assert_eq!("remote".parse::<ProviderKind>().ok(), Some(ProviderKind::Remote));
        assert_eq!("local".parse::<ProviderKind>().ok(), Some(ProviderKind::Local));
    }

    #[test]
    fn test_job_progress() {
        let mut job = EmbeddingJob {
            user_id: "u1".to_string(),
            file_id: "f1".to_string(),
            filename: "doc.pdf".to_string(),
            status: JobStatus::Processing,
            total_chunks: 4,
            completed_chunks: 1,
            provider: ProviderKind::Local,
            model_name: "nomic-embed-text".to_string(),
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(job.progress(), 0.25);

        job.completed_chunks = 4;
        assert_eq!(job.progress(), 1.0);

        job.total_chunks = 0;
        assert_eq!(job.progress(), 0.0);
    }
}
