//! Vector database adapter.
//!
//! Collections are the unit of isolation: one per (user, provider), so
//! vectors from different embedding spaces are never compared. Record ids
//! are derived deterministically from (document, segment, sub-chunk), which
//! makes re-embedding idempotent and concurrent per-user upserts safe.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::VectorStoreConfig;
use crate::db::ProviderKind;
use crate::error::{ServiceError, ServiceResult, VectorStoreError};

/// Name of the per-(user, provider) collection
pub fn collection_name(user_id: &str, provider: ProviderKind) -> String {
    format!("user_{user_id}_{provider}_documents")
}

/// One batch of records to upsert
#[derive(Debug, Default)]
pub struct VectorBatch {
    pub ids: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub documents: Vec<String>,
    pub metadatas: Vec<serde_json::Value>,
}

impl VectorBatch {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn push(
        &mut self,
        id: String,
        embedding: Vec<f32>,
        document: String,
        metadata: serde_json::Value,
    ) {
        self.ids.push(id);
        self.embeddings.push(embedding);
        self.documents.push(document);
        self.metadatas.push(metadata);
    }
}

/// A ranked similarity hit
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryHit {
    pub id: String,
    pub text: String,
    pub distance: f64,
    pub metadata: serde_json::Value,
}

/// Vector store HTTP client
pub struct VectorStoreClient {
    client: Client,
    base_url: String,
}

impl VectorStoreClient {
    pub fn new(config: &VectorStoreConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                ServiceError::VectorStore(VectorStoreError::Connection {
                    url: config.base_url.clone(),
                    source: e,
                })
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Get a collection's id, creating it when missing
    pub async fn get_or_create_collection(&self, name: &str) -> Result<String, VectorStoreError> {
        let url = format!("{}/api/v1/collections", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "name": name, "get_or_create": true }))
            .send()
            .await
            .map_err(|e| VectorStoreError::Connection {
                url: url.clone(),
                source: e,
            })?;

        let response = check_status(response).await?;
        let collection: CollectionResponse = decode(response).await?;
        Ok(collection.id)
    }

    /// Look up an existing collection's id; `None` when it doesn't exist
    pub async fn get_collection(&self, name: &str) -> Result<Option<String>, VectorStoreError> {
        let url = format!("{}/api/v1/collections/{name}", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| VectorStoreError::Connection {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let collection: CollectionResponse = decode(response).await?;
        Ok(Some(collection.id))
    }

    /// Drop and recreate a collection (dimension-mismatch remediation)
    pub async fn recreate_collection(&self, name: &str) -> Result<String, VectorStoreError> {
        self.delete_collection(name).await?;
        self.get_or_create_collection(name).await
    }

    /// Delete a collection by name; missing collections are fine
    pub async fn delete_collection(&self, name: &str) -> Result<bool, VectorStoreError> {
        let url = format!("{}/api/v1/collections/{name}", self.base_url);

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| VectorStoreError::Connection {
                url: url.clone(),
                source: e,
            })?;

        Ok(response.status().is_success())
    }

    /// Upsert a batch of records into a collection
    pub async fn add(
        &self,
        collection_id: &str,
        batch: &VectorBatch,
    ) -> Result<(), VectorStoreError> {
        let url = format!(
            "{}/api/v1/collections/{collection_id}/add",
            self.base_url
        );

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "ids": batch.ids,
                "embeddings": batch.embeddings,
                "documents": batch.documents,
                "metadatas": batch.metadatas,
            }))
            .send()
            .await
            .map_err(|e| VectorStoreError::Connection {
                url: url.clone(),
                source: e,
            })?;

        check_status(response).await?;
        Ok(())
    }

    /// Delete all records belonging to one document, returning how many
    /// were removed
    pub async fn delete_by_file(
        &self,
        collection_id: &str,
        file_id: &str,
    ) -> Result<usize, VectorStoreError> {
        let get_url = format!(
            "{}/api/v1/collections/{collection_id}/get",
            self.base_url
        );

        let response = self
            .client
            .post(&get_url)
            .json(&json!({ "where": { "file_id": file_id }, "include": [] }))
            .send()
            .await
            .map_err(|e| VectorStoreError::Connection {
                url: get_url.clone(),
                source: e,
            })?;

        let response = check_status(response).await?;
        let existing: GetResponse = decode(response).await?;

        if existing.ids.is_empty() {
            return Ok(0);
        }

        let delete_url = format!(
            "{}/api/v1/collections/{collection_id}/delete",
            self.base_url
        );

        let response = self
            .client
            .post(&delete_url)
            .json(&json!({ "ids": existing.ids }))
            .send()
            .await
            .map_err(|e| VectorStoreError::Connection {
                url: delete_url.clone(),
                source: e,
            })?;

        check_status(response).await?;
        Ok(existing.ids.len())
    }

    /// Query nearest vectors, optionally restricted by a metadata filter.
    /// Hits come back in ascending distance order.
    pub async fn query(
        &self,
        collection_id: &str,
        embedding: &[f32],
        n_results: usize,
        where_filter: Option<serde_json::Value>,
    ) -> Result<Vec<QueryHit>, VectorStoreError> {
        let url = format!(
            "{}/api/v1/collections/{collection_id}/query",
            self.base_url
        );

        let mut body = json!({
            "query_embeddings": [embedding],
            "n_results": n_results,
            "include": ["documents", "distances", "metadatas"],
        });
        if let Some(filter) = where_filter {
            body["where"] = filter;
        }

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| VectorStoreError::Connection {
                url: url.clone(),
                source: e,
            })?;

        let response = check_status(response).await?;
        let results: QueryResponse = decode(response).await?;
        Ok(hits_from_response(results))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, VectorStoreError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    Err(VectorStoreError::Request { status, message })
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, VectorStoreError> {
    response
        .json()
        .await
        .map_err(|e| VectorStoreError::InvalidResponse {
            source: serde_json::Error::io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e.to_string(),
            )),
        })
}

fn hits_from_response(results: QueryResponse) -> Vec<QueryHit> {
    let ids = results.ids.into_iter().next().unwrap_or_default();
    let mut distances = results
        .distances
        .unwrap_or_default()
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter();
    let mut documents = results
        .documents
        .unwrap_or_default()
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter();
    let mut metadatas = results
        .metadatas
        .unwrap_or_default()
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter();

    ids.into_iter()
        .map(|id| QueryHit {
            id,
            distance: distances.next().unwrap_or(f64::MAX),
            text: documents.next().flatten().unwrap_or_default(),
            metadata: metadatas
                .next()
                .flatten()
                .unwrap_or(serde_json::Value::Null),
        })
        .collect()
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    distances: Option<Vec<Vec<f64>>>,
    documents: Option<Vec<Vec<Option<String>>>>,
    metadatas: Option<Vec<Vec<Option<serde_json::Value>>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_name_is_provider_scoped() {
        assert_eq!(
            collection_name("alice", ProviderKind::Remote),
            "user_alice_remote_documents"
        );
        assert_eq!(
            collection_name("alice", ProviderKind::Local),
            "user_alice_local_documents"
        );
    }

    #[test]
    fn test_batch_push() {
        let mut batch = VectorBatch::default();
        assert!(batch.is_empty());

        batch.push(
            "f1_0".to_string(),
            vec![0.1, 0.2],
            "text".to_string(),
            serde_json::json!({ "file_id": "f1" }),
        );
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_hits_from_response_pairs_columns() {
        let results = QueryResponse {
            ids: vec![vec!["f1_0".to_string(), "f1_1".to_string()]],
            distances: Some(vec![vec![0.1, 0.4]]),
            documents: Some(vec![vec![Some("first".to_string()), None]]),
            metadatas: Some(vec![vec![
                Some(serde_json::json!({ "page_number": 1 })),
                None,
            ]]),
        };

        let hits = hits_from_response(results);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "f1_0");
        assert_eq!(hits[0].distance, 0.1);
        assert_eq!(hits[0].text, "first");
        assert_eq!(hits[1].text, "");
        assert!(hits[1].metadata.is_null());
    }

    #[test]
    fn test_hits_from_empty_response() {
        let results = QueryResponse {
            ids: vec![],
            distances: None,
            documents: None,
            metadatas: None,
        };
        assert!(hits_from_response(results).is_empty());
    }
}
