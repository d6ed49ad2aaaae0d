//! Local embedding provider.
//!
//! Talks to an Ollama-style model server. Local models carry much smaller
//! context windows than hosted APIs, so inputs are chunked against a
//! discovered per-model character budget before embedding. When the batch
//! endpoint fails, falls back to one-by-one embedding with truncation,
//! trading completeness for resilience.

use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{EmbeddedChunk, EmbeddedText};
use crate::cache::KvCache;
use crate::chunker::chunk_text;
use crate::error::ProviderError;

/// Assumed context length when model introspection fails
const DEFAULT_CONTEXT_LENGTH: u64 = 512;

/// Conservative chars-per-token proxy for the character budget
const CHARS_PER_TOKEN: f64 = 0.8;

pub struct LocalProvider {
    client: Client,
    base_url: String,
    model: String,
    context_cache: Arc<KvCache<u64>>,
}

impl LocalProvider {
    pub fn new(
        base_url: &str,
        model: &str,
        timeout: Duration,
        context_cache: Arc<KvCache<u64>>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Connection {
                url: base_url.to_string(),
                source: e,
            })?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            model: model.to_string(),
            context_cache,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Discover the model's context length, once per model per process
    async fn context_length(&self) -> u64 {
        if let Some(length) = self.context_cache.get(&self.model) {
            return length;
        }

        let length = self
            .fetch_context_length()
            .await
            .unwrap_or(DEFAULT_CONTEXT_LENGTH);
        debug!(model = %self.model, context_length = length, "Model context length resolved");

        self.context_cache.set(self.model.clone(), length);
        length
    }

    async fn fetch_context_length(&self) -> Option<u64> {
        let url = format!("{}/api/show", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "name": &self.model }))
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }

        let show: ShowResponse = response.json().await.ok()?;
        let info = show.model_info?;
        let arch = info.get("general.architecture")?.as_str()?;
        info.get(&format!("{arch}.context_length"))?.as_u64()
    }

    /// Embed a batch of texts.
    ///
    /// Each input is chunked against the model's character budget; results
    /// carry one vector per sub-chunk so callers can store them separately.
    pub async fn batch_embed(&self, texts: &[String]) -> Result<Vec<EmbeddedText>, ProviderError> {
        let budget = char_budget(self.context_length().await);

        let mut counts = Vec::with_capacity(texts.len());
        let mut flattened = Vec::new();
        for text in texts {
            let parts = chunk_text(text, budget);
            counts.push(parts.len());
            flattened.extend(parts);
        }

        match self.embed_batch_request(&flattened).await {
            Ok(vectors) if vectors.len() == flattened.len() => {
                Ok(reassemble(&counts, flattened, vectors))
            }
            Ok(vectors) => {
                warn!(
                    expected = flattened.len(),
                    received = vectors.len(),
                    "Batch embedding returned wrong vector count, falling back to one-by-one"
                );
                self.embed_one_by_one(texts, budget).await
            }
            Err(e) => {
                warn!(error = %e, "Batch embedding failed, falling back to one-by-one");
                self.embed_one_by_one(texts, budget).await
            }
        }
    }

    /// Fallback path: truncate instead of chunking, one request per text
    async fn embed_one_by_one(
        &self,
        texts: &[String],
        budget: usize,
    ) -> Result<Vec<EmbeddedText>, ProviderError> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            let truncated = truncate_chars(text, budget);
            let vector = self.embed_single(&truncated).await?;
            results.push(EmbeddedText::single(truncated, vector));
        }
        Ok(results)
    }

    async fn embed_batch_request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let url = format!("{}/api/embed", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "model": self.model,
                "input": inputs,
            }))
            .send()
            .await
            .map_err(|e| ProviderError::Connection {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(self.request_error(response).await);
        }

        let body: BatchEmbedResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    source: serde_json::Error::io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        e.to_string(),
                    )),
                })?;

        Ok(body.embeddings)
    }

    async fn embed_single(&self, prompt: &str) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/api/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": prompt,
            }))
            .send()
            .await
            .map_err(|e| ProviderError::Connection {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(self.request_error(response).await);
        }

        let body: SingleEmbedResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    source: serde_json::Error::io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        e.to_string(),
                    )),
                })?;

        Ok(body.embedding)
    }

    async fn request_error(&self, response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();

        if message.contains("model") && message.contains("not found") {
            return ProviderError::ModelNotFound {
                model: self.model.clone(),
            };
        }

        ProviderError::Request { status, message }
    }
}

fn char_budget(context_length: u64) -> usize {
    (context_length as f64 * CHARS_PER_TOKEN) as usize
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Group flattened per-chunk vectors back into one result per input text
fn reassemble(
    counts: &[usize],
    chunks: Vec<String>,
    vectors: Vec<Vec<f32>>,
) -> Vec<EmbeddedText> {
    let mut paired = chunks.into_iter().zip(vectors);
    counts
        .iter()
        .map(|&count| EmbeddedText {
            chunks: paired
                .by_ref()
                .take(count)
                .map(|(text, vector)| EmbeddedChunk { text, vector })
                .collect(),
        })
        .collect()
}

#[derive(Deserialize)]
struct ShowResponse {
    model_info: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct SingleEmbedResponse {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_budget() {
        assert_eq!(char_budget(512), 409);
        assert_eq!(char_budget(8192), 6553);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("hello world", 5), "hello");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn test_reassemble_groups_by_count() {
        let counts = [1, 3, 1];
        let chunks: Vec<String> = ["a", "b1", "b2", "b3", "c"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let vectors: Vec<Vec<f32>> = (0..5).map(|i| vec![i as f32]).collect();

        let results = reassemble(&counts, chunks, vectors);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunks.len(), 1);
        assert!(!results[0].is_split());
        assert_eq!(results[1].chunks.len(), 3);
        assert!(results[1].is_split());
        assert_eq!(results[1].chunks[2].text, "b3");
        assert_eq!(results[1].chunks[2].vector, vec![3.0]);
        assert_eq!(results[2].chunks[0].text, "c");
    }
}
