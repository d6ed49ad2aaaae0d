mod consistency;
mod crud;
mod pipeline;
mod scheduler;
mod search;

pub use consistency::{ConsistencyReport, InconsistentFile, ReembedOutcome};
pub use search::{SearchHit, SearchOutcome};

use std::sync::Arc;
use tracing::info;

use crate::cache::KvCache;
use crate::config::StaticConfig;
use crate::db::{Database, EmbeddingSettings};
use crate::embedding::EmbeddingClient;
use crate::error::ServiceResult;
use crate::jobs::JobQueue;
use crate::segmentation::SegmentationClient;
use crate::segments::SegmentStore;
use crate::vector_store::VectorStoreClient;

/// Main service coordinator
pub struct ScriptoriumService {
    pub config: Arc<StaticConfig>,
    pub db: Arc<Database>,
    pub segments: SegmentStore,
    pub segmentation: SegmentationClient,
    pub vectors: VectorStoreClient,
    /// Memoized model context lengths, discovered once per model
    pub model_cache: Arc<KvCache<u64>>,
    pub jobs: JobQueue,
}

impl ScriptoriumService {
    /// Create a new service instance
    pub fn new(db: Arc<Database>, config: Arc<StaticConfig>) -> ServiceResult<Self> {
        info!("Initializing Scriptorium service");

        let segments = SegmentStore::new(&config.storage.data_dir);
        let segmentation = SegmentationClient::new(&config.segmentation)?;
        let vectors = VectorStoreClient::new(&config.vector_store)?;

        info!(
            segmentation_url = %config.segmentation.base_url,
            vector_store_url = %config.vector_store.base_url,
            "Collaborator clients initialized"
        );

        Ok(Self {
            config,
            db,
            segments,
            segmentation,
            vectors,
            model_cache: Arc::new(KvCache::new()),
            jobs: JobQueue::new(),
        })
    }

    /// Build an embedding client for the given settings
    pub(crate) fn embedding_client(
        &self,
        settings: &EmbeddingSettings,
    ) -> ServiceResult<EmbeddingClient> {
        Ok(EmbeddingClient::from_settings(
            settings,
            &self.config.embedding,
            self.model_cache.clone(),
        )?)
    }
}
