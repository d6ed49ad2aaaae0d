//! Remote hosted embedding provider.
//!
//! Talks to an OpenAI-compatible embeddings endpoint. Credentials are
//! per-user by design: a missing key is a configuration error, never a
//! silent fallback to a process-wide key.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::EmbeddedText;
use crate::error::ProviderError;

pub struct RemoteProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl RemoteProvider {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
        user_id: &str,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey {
                user_id: user_id.to_string(),
            })?;

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
            api_key,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Embed a batch of texts, returning one vector per input
    pub async fn batch_embed(&self, texts: &[String]) -> Result<Vec<EmbeddedText>, ProviderError> {
        let url = format!("{}/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await
            .map_err(|e| ProviderError::Connection {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();

            if status == 401 || status == 403 {
                return Err(ProviderError::Authentication { message });
            }
            if status == 404 || (message.contains("model") && message.contains("not found")) {
                return Err(ProviderError::ModelNotFound {
                    model: self.model.clone(),
                });
            }

            return Err(ProviderError::Request { status, message });
        }

        let body: EmbeddingsResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    source: serde_json::Error::io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        e.to_string(),
                    )),
                })?;

        // The API is not required to preserve order; re-slot by index
        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for item in body.data {
            if item.index < vectors.len() {
                vectors[item.index] = Some(item.embedding);
            }
        }

        texts
            .iter()
            .zip(vectors)
            .map(|(text, vector)| {
                let vector = vector.ok_or_else(|| ProviderError::Request {
                    status: 200,
                    message: format!(
                        "Response missing embedding for input (expected {} vectors)",
                        texts.len()
                    ),
                })?;
                Ok(EmbeddedText::single(text.clone(), vector))
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
