//! Service configuration.

mod static_config;

pub use static_config::{
    EmbeddingConfig, SegmentationConfig, ServerConfig, StaticConfig, StorageConfig,
    VectorStoreConfig,
};
