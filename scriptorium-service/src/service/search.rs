//! Similarity search.
//!
//! Embeds the query and retrieves nearest vectors from the user's
//! provider-scoped collection. A document-scoped search always uses the
//! embedding space the document was indexed in; a global search uses the
//! user's current settings, and refuses with a structured warning when any
//! indexed document lives in a different space.

use serde::Serialize;
use tracing::warn;

use crate::db::{EmbeddingSettings, JobStatus};
use crate::error::{EmbeddingError, ServiceResult};
use crate::service::consistency::InconsistentFile;
use crate::service::ScriptoriumService;
use crate::vector_store::collection_name;

/// A ranked search hit; ascending distance means most similar first
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub distance: f64,
    pub metadata: serde_json::Value,
}

/// Search result: ranked hits, or a warning sentinel when the user's index
/// is inconsistent with their current settings. Callers must check for the
/// sentinel before treating the result as hits.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchOutcome {
    Hits { hits: Vec<SearchHit> },
    InconsistencyWarning {
        message: String,
        inconsistent_files: Vec<InconsistentFile>,
    },
}

impl ScriptoriumService {
    /// Search a user's indexed documents.
    ///
    /// With `file_id`, results are restricted to that document and the query
    /// is embedded with the provider/model recorded on its completed job.
    /// Without it, the user's current settings apply after a consistency
    /// check.
    pub async fn search(
        &self,
        user_id: &str,
        query: &str,
        top_k: usize,
        file_id: Option<&str>,
    ) -> ServiceResult<SearchOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchOutcome::Hits { hits: Vec::new() });
        }

        let settings = self.db.get_embedding_settings(user_id)?;

        // Resolve which embedding space to search in
        let resolved = match file_id {
            Some(id) => self
                .db
                .get_embedding_job(user_id, id)?
                .filter(|job| job.status == JobStatus::Completed)
                .map(|job| (job.provider, job.model_name)),
            None => None,
        };

        let (provider, model_name) = match resolved {
            // File-scoped: always the space the document was indexed in,
            // even if global settings changed afterwards
            Some(space) => space,
            None => {
                let settings = settings.as_ref().ok_or_else(|| {
                    EmbeddingError::SettingsMissing {
                        user_id: user_id.to_string(),
                    }
                })?;

                // Global searches refuse to mix embedding spaces
                if file_id.is_none() {
                    let report = self.check_embedding_consistency(user_id, None)?;
                    if !report.consistent {
                        return Ok(SearchOutcome::InconsistencyWarning {
                            message: format!(
                                "{} document(s) were embedded with different settings; \
                                 re-embed them before searching globally",
                                report.inconsistent_files.len()
                            ),
                            inconsistent_files: report.inconsistent_files,
                        });
                    }
                }

                (settings.provider, settings.model_name.clone())
            }
        };

        let client_settings = EmbeddingSettings {
            user_id: user_id.to_string(),
            provider,
            model_name,
            api_key: settings.and_then(|s| s.api_key),
            updated_at: chrono::Utc::now(),
        };
        let client = self.embedding_client(&client_settings)?;

        // A query that cannot be embedded yields no results
        let query_vector = match client.batch_embed(&[query.to_string()]).await {
            Ok(mut results) if !results.is_empty() && !results[0].chunks.is_empty() => {
                results.swap_remove(0).chunks.swap_remove(0).vector
            }
            Ok(_) => return Ok(SearchOutcome::Hits { hits: Vec::new() }),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Query embedding failed");
                return Ok(SearchOutcome::Hits { hits: Vec::new() });
            }
        };

        // A user without a collection has nothing indexed yet
        let name = collection_name(user_id, provider);
        let Some(collection_id) = self.vectors.get_collection(&name).await? else {
            return Ok(SearchOutcome::Hits { hits: Vec::new() });
        };

        let where_filter = file_id.map(|id| serde_json::json!({ "file_id": id }));
        let hits = self
            .vectors
            .query(&collection_id, &query_vector, top_k, where_filter)
            .await?;

        Ok(SearchOutcome::Hits {
            hits: hits
                .into_iter()
                .map(|hit| SearchHit {
                    id: hit.id,
                    text: hit.text,
                    distance: hit.distance,
                    metadata: hit.metadata,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfig;
    use crate::db::{Database, EmbeddingJob, ProviderKind};
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

    #[tokio::test]
    async fn test_blank_query_returns_no_hits() {
        let service = test_service();

        // Trimmed-empty queries short-circuit before settings are consulted
        let outcome = service.search("u1", "   \n ", 5, None).await.unwrap();
        match outcome {
            SearchOutcome::Hits { hits } => assert!(hits.is_empty()),
            SearchOutcome::InconsistencyWarning { .. } => panic!("expected empty hits"),
        }
    }

    #[tokio::test]
    async fn test_global_search_refuses_mixed_spaces() {
        let service = test_service();
        service
            .db
            .set_embedding_settings(&local_settings("nomic-embed-text"))
            .unwrap();
        service
            .db
            .reset_embedding_job(&EmbeddingJob {
                user_id: "u1".to_string(),
                file_id: "f1".to_string(),
                filename: "f1.pdf".to_string(),
                status: JobStatus::Completed,
                total_chunks: 3,
                completed_chunks: 3,
                provider: ProviderKind::Local,
                model_name: "all-minilm".to_string(),
                error_message: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap();

        let outcome = service
            .search("u1", "what does the report say", 5, None)
            .await
            .unwrap();
        match outcome {
            SearchOutcome::InconsistencyWarning {
                inconsistent_files, ..
            } => {
                assert_eq!(inconsistent_files.len(), 1);
                assert_eq!(inconsistent_files[0].file_id, "f1");
                assert_eq!(inconsistent_files[0].model_name, "all-minilm");
            }
            SearchOutcome::Hits { .. } => panic!("expected inconsistency warning"),
        }
    }
}
