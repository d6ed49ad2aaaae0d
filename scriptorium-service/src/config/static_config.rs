//! Static configuration that cannot be changed at runtime.
//! These settings affect server binding or collaborator endpoints and
//! require a restart to change.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Static configuration loaded at startup
#[derive(Debug, Clone, Deserialize)]
pub struct StaticConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_segmentation")]
    pub segmentation: SegmentationConfig,

    #[serde(default = "default_embedding")]
    pub embedding: EmbeddingConfig,

    #[serde(default = "default_vector_store")]
    pub vector_store: VectorStoreConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum accepted upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

/// External segmentation service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentationConfig {
    #[serde(default = "default_segmentation_url")]
    pub base_url: String,

    /// Segmentation jobs run OCR over whole documents and can take minutes
    #[serde(default = "default_segmentation_timeout_secs")]
    pub timeout_secs: u64,
}

impl SegmentationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Embedding provider endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_remote_base_url")]
    pub remote_base_url: String,

    #[serde(default = "default_local_base_url")]
    pub local_base_url: String,

    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Vector database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_store_url")]
    pub base_url: String,

    #[serde(default = "default_vector_store_timeout_secs")]
    pub timeout_secs: u64,
}

impl VectorStoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ==================== Default Value Functions ====================

pub(crate) fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8080
}

pub(crate) fn default_storage() -> StorageConfig {
    StorageConfig {
        data_dir: default_data_dir(),
        max_upload_bytes: default_max_upload_bytes(),
    }
}

pub(crate) fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

pub(crate) fn default_max_upload_bytes() -> u64 {
    100 * 1024 * 1024
}

pub(crate) fn default_segmentation() -> SegmentationConfig {
    SegmentationConfig {
        base_url: default_segmentation_url(),
        timeout_secs: default_segmentation_timeout_secs(),
    }
}

pub(crate) fn default_segmentation_url() -> String {
    "http://localhost:5060".to_string()
}

pub(crate) fn default_segmentation_timeout_secs() -> u64 {
    600
}

pub(crate) fn default_embedding() -> EmbeddingConfig {
    EmbeddingConfig {
        remote_base_url: default_remote_base_url(),
        local_base_url: default_local_base_url(),
        timeout_secs: default_embedding_timeout_secs(),
    }
}

pub(crate) fn default_remote_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub(crate) fn default_local_base_url() -> String {
    "http://localhost:11434".to_string()
}

pub(crate) fn default_embedding_timeout_secs() -> u64 {
    120
}

pub(crate) fn default_vector_store() -> VectorStoreConfig {
    VectorStoreConfig {
        base_url: default_vector_store_url(),
        timeout_secs: default_vector_store_timeout_secs(),
    }
}

pub(crate) fn default_vector_store_url() -> String {
    "http://localhost:8000".to_string()
}

pub(crate) fn default_vector_store_timeout_secs() -> u64 {
    60
}
