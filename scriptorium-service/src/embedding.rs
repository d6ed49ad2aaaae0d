//! Embedding provider abstraction.
//!
//! Two provider variants share one contract: embed a batch of texts and
//! return vectors, or probe a model for settings validation. The remote
//! variant talks to a hosted API with per-user credentials; the local
//! variant talks to a model server with small context windows and chunks
//! oversized inputs before embedding.

pub mod local;
pub mod remote;

pub use local::LocalProvider;
pub use remote::RemoteProvider;

use std::sync::Arc;
use std::time::Duration;

use crate::cache::KvCache;
use crate::config::EmbeddingConfig;
use crate::db::{EmbeddingSettings, ProviderKind};
use crate::error::ProviderError;

/// Fixed probe string used to validate embedding settings
pub const EMBEDDING_PROBE: &str = "This is a test sentence for embedding.";

/// Remote APIs tolerate large batches; local model servers do not
const REMOTE_BATCH_SIZE: usize = 100;
const LOCAL_BATCH_SIZE: usize = 20;

/// Inter-batch delays respect remote rate limits
const REMOTE_BATCH_DELAY: Duration = Duration::from_secs(1);
const LOCAL_BATCH_DELAY: Duration = Duration::from_millis(100);

/// One embedded sub-chunk of an input text
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub text: String,
    pub vector: Vec<f32>,
}

/// Embedding result for one input text.
///
/// Holds a single chunk when the text fit the provider's context budget,
/// or several when the local provider had to split it.
#[derive(Debug, Clone)]
pub struct EmbeddedText {
    pub chunks: Vec<EmbeddedChunk>,
}

impl EmbeddedText {
    pub fn single(text: String, vector: Vec<f32>) -> Self {
        Self {
            chunks: vec![EmbeddedChunk { text, vector }],
        }
    }

    pub fn is_split(&self) -> bool {
        self.chunks.len() > 1
    }
}

/// Embedding client dispatching to the configured provider variant
pub enum EmbeddingClient {
    Remote(RemoteProvider),
    Local(LocalProvider),
}

impl EmbeddingClient {
    /// Build a client for a user's stored settings.
    ///
    /// This is the single place provider selection happens; everything
    /// downstream goes through the common contract.
    pub fn from_settings(
        settings: &EmbeddingSettings,
        config: &EmbeddingConfig,
        cache: Arc<KvCache<u64>>,
    ) -> Result<Self, ProviderError> {
        match settings.provider {
            ProviderKind::Remote => Ok(Self::Remote(RemoteProvider::new(
                &config.remote_base_url,
                &settings.model_name,
                settings.api_key.clone(),
                config.timeout(),
                &settings.user_id,
            )?)),
            ProviderKind::Local => Ok(Self::Local(LocalProvider::new(
                &config.local_base_url,
                &settings.model_name,
                config.timeout(),
                cache,
            )?)),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        match self {
            EmbeddingClient::Remote(_) => ProviderKind::Remote,
            EmbeddingClient::Local(_) => ProviderKind::Local,
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            EmbeddingClient::Remote(p) => p.model_name(),
            EmbeddingClient::Local(p) => p.model_name(),
        }
    }

    pub fn batch_size(&self) -> usize {
        match self {
            EmbeddingClient::Remote(_) => REMOTE_BATCH_SIZE,
            EmbeddingClient::Local(_) => LOCAL_BATCH_SIZE,
        }
    }

    pub fn batch_delay(&self) -> Duration {
        match self {
            EmbeddingClient::Remote(_) => REMOTE_BATCH_DELAY,
            EmbeddingClient::Local(_) => LOCAL_BATCH_DELAY,
        }
    }

    /// Embed a batch of texts, one result per input in order
    pub async fn batch_embed(&self, texts: &[String]) -> Result<Vec<EmbeddedText>, ProviderError> {
        match self {
            EmbeddingClient::Remote(p) => p.batch_embed(texts).await,
            EmbeddingClient::Local(p) => p.batch_embed(texts).await,
        }
    }

    /// Probe the configured model with a fixed test sentence
    pub async fn test(&self) -> (bool, String) {
        match self.batch_embed(&[EMBEDDING_PROBE.to_string()]).await {
            Ok(results) if results.first().is_some_and(|r| !r.chunks.is_empty()) => (
                true,
                format!("Embedding model '{}' responded", self.model_name()),
            ),
            Ok(_) => (false, "Embedding model returned no vectors".to_string()),
            Err(e) => (false, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn settings(provider: ProviderKind, api_key: Option<&str>) -> EmbeddingSettings {
        EmbeddingSettings {
            user_id: "u1".to_string(),
            provider,
            model_name: "test-model".to_string(),
            api_key: api_key.map(String::from),
            updated_at: Utc::now(),
        }
    }

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            remote_base_url: "https://api.example.com/v1".to_string(),
            local_base_url: "http://localhost:11434".to_string(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_factory_selects_variant() {
        let cache = Arc::new(KvCache::new());

        let client = EmbeddingClient::from_settings(
            &settings(ProviderKind::Remote, Some("sk-test")),
            &config(),
            cache.clone(),
        )
        .unwrap();
        assert_eq!(client.provider(), ProviderKind::Remote);
        assert_eq!(client.batch_size(), 100);

        let client =
            EmbeddingClient::from_settings(&settings(ProviderKind::Local, None), &config(), cache)
                .unwrap();
        assert_eq!(client.provider(), ProviderKind::Local);
        assert_eq!(client.batch_size(), 20);
    }

    #[test]
    fn test_remote_requires_api_key() {
        let cache = Arc::new(KvCache::new());
        let result = EmbeddingClient::from_settings(
            &settings(ProviderKind::Remote, None),
            &config(),
            cache,
        );
        assert!(matches!(
            result,
            Err(ProviderError::MissingApiKey { .. })
        ));
    }
}
