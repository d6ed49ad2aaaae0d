//! Embedding pipeline orchestrator.
//!
//! Drives chunking, batched provider calls, vector-store upserts, and
//! progress updates for one document. The pipeline is fire-and-forget: the
//! caller learns that processing started and polls the persisted job for
//! progress. Cancellation is cooperative, checked once per batch boundary.
//!
//! Progress counts original segments, not stored vectors: chunking fan-out
//! on the local provider is invisible to clients, which keeps progress bars
//! stable regardless of how texts were split.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::{EmbeddingJob, JobStatus};
use crate::embedding::EmbeddingClient;
use crate::error::{EmbeddingError, ServiceError, ServiceResult};
use crate::segments::Segment;
use crate::service::ScriptoriumService;
use crate::vector_store::{VectorBatch, collection_name};

/// Message recorded when the user cancels an embedding job
const CANCELLED_MESSAGE: &str = "Cancelled by user";

impl ScriptoriumService {
    /// Start embedding a document's segments.
    ///
    /// Validates settings and segments synchronously, resets the job
    /// tracker, and schedules the pipeline in the background. Returns the
    /// freshly created job.
    pub fn start_embedding(
        self: &Arc<Self>,
        user_id: &str,
        file_id: &str,
    ) -> ServiceResult<EmbeddingJob> {
        let (job, segments, client) = self.prepare_embedding(user_id, file_id)?;

        let service = self.clone();
        let job_user = job.user_id.clone();
        let job_file = job.file_id.clone();
        self.jobs.submit(
            format!("embedding:{user_id}:{file_id}"),
            async move {
                service
                    .run_embedding_pipeline(&job_user, &job_file, segments, client)
                    .await;
            },
        );

        Ok(job)
    }

    /// Validate inputs and reset the job tracker for a new embedding run
    pub(super) fn prepare_embedding(
        &self,
        user_id: &str,
        file_id: &str,
    ) -> ServiceResult<(EmbeddingJob, Vec<Segment>, EmbeddingClient)> {
        let doc = self.get_document_for_user(user_id, file_id)?;

        let settings = self.db.get_embedding_settings(user_id)?.ok_or_else(|| {
            EmbeddingError::SettingsMissing {
                user_id: user_id.to_string(),
            }
        })?;
        let client = self.embedding_client(&settings)?;

        let segments = self
            .segments
            .load_segments(&doc.user_id, &doc.id, &doc.filename)?;
        let valid: Vec<Segment> = segments.into_iter().filter(Segment::is_valid).collect();

        if valid.is_empty() {
            return Err(ServiceError::Embedding(EmbeddingError::NoValidSegments {
                document_id: file_id.to_string(),
            }));
        }

        // total_chunks estimates work in original segments; the stored
        // vector count may be higher after chunking
        let now = chrono::Utc::now();
        let job = EmbeddingJob {
            user_id: user_id.to_string(),
            file_id: file_id.to_string(),
            filename: doc.filename.clone(),
            status: JobStatus::Processing,
            total_chunks: valid.len(),
            completed_chunks: 0,
            provider: client.provider(),
            model_name: client.model_name().to_string(),
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.db.reset_embedding_job(&job)?;

        info!(
            doc_id = %file_id,
            provider = %job.provider,
            model = %job.model_name,
            segments = valid.len(),
            "Embedding job started"
        );

        Ok((job, valid, client))
    }

    /// Background pipeline wrapper: any escaping error lands the job in a
    /// terminal failed state.
    pub(super) async fn run_embedding_pipeline(
        &self,
        user_id: &str,
        file_id: &str,
        segments: Vec<Segment>,
        client: EmbeddingClient,
    ) {
        if let Err(e) = self.embed_segments(user_id, file_id, &segments, &client).await {
            error!(doc_id = %file_id, error = %e, "Embedding pipeline failed");
            match self.db.fail_embedding_job(user_id, file_id, &e.to_string()) {
                Ok(true) => {}
                Ok(false) => {
                    info!(doc_id = %file_id, "Job already terminal, failure not recorded");
                }
                Err(write_err) => {
                    error!(doc_id = %file_id, error = %write_err, "Failed to record embedding failure");
                }
            }
        }
    }

    async fn embed_segments(
        &self,
        user_id: &str,
        file_id: &str,
        segments: &[Segment],
        client: &EmbeddingClient,
    ) -> ServiceResult<()> {
        let name = collection_name(user_id, client.provider());
        let mut collection_id = self.vectors.get_or_create_collection(&name).await?;

        // Idempotent re-embed: old vectors always go before new ones
        match self.vectors.delete_by_file(&collection_id, file_id).await {
            Ok(removed) if removed > 0 => {
                info!(doc_id = %file_id, removed, "Removed prior vectors before re-embedding");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(doc_id = %file_id, error = %e, "Failed to remove prior vectors, continuing");
            }
        }

        let batch_size = client.batch_size();
        for (batch_no, batch) in segments.chunks(batch_size).enumerate() {
            let offset = batch_no * batch_size;

            // Cooperative cancellation, polled once per batch. The in-flight
            // batch always completes before a cancel takes effect, so its
            // vectors land after the cancel's cleanup and are removed here.
            if self.db.get_embedding_job_status(user_id, file_id)? == Some(JobStatus::Cancelled) {
                info!(doc_id = %file_id, "Embedding job cancelled, stopping pipeline");
                self.remove_vectors_after_cancel(&collection_id, file_id).await;
                return Ok(());
            }

            match self
                .embed_batch_with_retry(&name, &mut collection_id, user_id, file_id, offset, batch, client)
                .await
            {
                Ok(()) => {
                    // Progress advances by original segments processed
                    self.db
                        .advance_embedding_progress(user_id, file_id, batch.len())?;
                }
                Err(e) => {
                    // A bad batch does not abort the whole document
                    warn!(
                        doc_id = %file_id,
                        batch_start = offset,
                        batch_len = batch.len(),
                        error = %e,
                        "Embedding batch failed, skipping"
                    );
                }
            }

            tokio::time::sleep(client.batch_delay()).await;
        }

        // A cancel that landed during the final batch has no later poll to
        // catch it; check again before recording completion
        if self.db.get_embedding_job_status(user_id, file_id)? == Some(JobStatus::Cancelled) {
            info!(doc_id = %file_id, "Embedding job cancelled after final batch");
            self.remove_vectors_after_cancel(&collection_id, file_id).await;
            return Ok(());
        }

        if self.db.complete_embedding_job(user_id, file_id)? {
            info!(doc_id = %file_id, "Embedding job completed");
        }
        Ok(())
    }

    /// Best-effort removal of vectors written by a batch that was in flight
    /// when the job got cancelled
    async fn remove_vectors_after_cancel(&self, collection_id: &str, file_id: &str) {
        if let Err(e) = self.vectors.delete_by_file(collection_id, file_id).await {
            warn!(doc_id = %file_id, error = %e, "Failed to remove vectors after cancel");
        }
    }

    /// Embed one batch, recreating the collection and retrying once when
    /// the vector store rejects the embedding dimension (the model changed
    /// since the collection was created).
    #[allow(clippy::too_many_arguments)]
    async fn embed_batch_with_retry(
        &self,
        name: &str,
        collection_id: &mut String,
        user_id: &str,
        file_id: &str,
        offset: usize,
        batch: &[Segment],
        client: &EmbeddingClient,
    ) -> ServiceResult<()> {
        match self
            .embed_batch(collection_id, user_id, file_id, offset, batch, client)
            .await
        {
            Err(ServiceError::VectorStore(e)) if e.is_dimension_mismatch() => {
                warn!(
                    doc_id = %file_id,
                    collection = %name,
                    "Embedding dimension mismatch, recreating collection and retrying batch"
                );
                *collection_id = self.vectors.recreate_collection(name).await?;
                self.embed_batch(collection_id, user_id, file_id, offset, batch, client)
                    .await
            }
            result => result,
        }
    }

    async fn embed_batch(
        &self,
        collection_id: &str,
        user_id: &str,
        file_id: &str,
        offset: usize,
        batch: &[Segment],
        client: &EmbeddingClient,
    ) -> ServiceResult<()> {
        let texts: Vec<String> = batch.iter().map(|s| s.text.clone()).collect();
        let embedded = client.batch_embed(&texts).await?;

        let mut records = VectorBatch::default();
        for (i, (segment, result)) in batch.iter().zip(embedded).enumerate() {
            let chunk_index = offset + i;
            let split = result.is_split();

            for (sub, chunk) in result.chunks.into_iter().enumerate() {
                let id = if split {
                    format!("{file_id}_{chunk_index}_{sub}")
                } else {
                    format!("{file_id}_{chunk_index}")
                };

                let mut metadata = serde_json::json!({
                    "file_id": file_id,
                    "user_id": user_id,
                    "chunk_index": chunk_index,
                    "segment_type": segment.segment_type,
                    "page_number": segment.page_number,
                    "page_left": segment.left,
                    "page_top": segment.top,
                    "text_length": chunk.text.chars().count(),
                });
                if split {
                    metadata["sub_chunk"] = serde_json::json!(sub);
                }

                records.push(id, chunk.vector, chunk.text, metadata);
            }
        }

        self.vectors.add(collection_id, &records).await?;
        Ok(())
    }

    /// Get the embedding job for a document, enforcing ownership
    pub fn get_embedding_job(&self, user_id: &str, file_id: &str) -> ServiceResult<EmbeddingJob> {
        self.get_document_for_user(user_id, file_id)?;
        self.db
            .get_embedding_job(user_id, file_id)?
            .ok_or_else(|| ServiceError::EmbeddingJobNotFound {
                document_id: file_id.to_string(),
            })
    }

    /// Cancel a processing embedding job and remove any vectors already
    /// written for the document.
    pub async fn cancel_embedding(&self, user_id: &str, file_id: &str) -> ServiceResult<()> {
        let cancelled = self
            .db
            .cancel_embedding_job(user_id, file_id, CANCELLED_MESSAGE)?;

        if !cancelled {
            return Err(ServiceError::InvalidStatus {
                message: "Only processing embedding jobs can be cancelled".to_string(),
            });
        }

        info!(doc_id = %file_id, "Embedding job cancelled");

        // Best-effort vector cleanup; the job is already terminal
        if let Some(job) = self.db.get_embedding_job(user_id, file_id)? {
            let name = collection_name(user_id, job.provider);
            match self.vectors.get_collection(&name).await {
                Ok(Some(collection_id)) => {
                    if let Err(e) = self.vectors.delete_by_file(&collection_id, file_id).await {
                        warn!(doc_id = %file_id, error = %e, "Failed to remove vectors after cancel");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(doc_id = %file_id, error = %e, "Failed to look up collection after cancel");
                }
            }
        }

        Ok(())
    }

    /// Remove a document's vectors and job record; idempotent
    pub async fn delete_embeddings(&self, user_id: &str, file_id: &str) -> ServiceResult<bool> {
        if let Some(job) = self.db.get_embedding_job(user_id, file_id)? {
            let name = collection_name(user_id, job.provider);
            if let Some(collection_id) = self.vectors.get_collection(&name).await? {
                let removed = self.vectors.delete_by_file(&collection_id, file_id).await?;
                if removed > 0 {
                    info!(doc_id = %file_id, removed, "Deleted document vectors");
                }
            }
        }

        self.db.delete_embedding_job(user_id, file_id)
    }
}
