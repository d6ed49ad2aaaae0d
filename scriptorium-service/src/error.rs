use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Document not found: {document_id}")]
    DocumentNotFound { document_id: String },

    #[error("Embedding job not found for document: {document_id}")]
    EmbeddingJobNotFound { document_id: String },

    #[error("Invalid status for this operation: {message}")]
    InvalidStatus { message: String },

    #[error("{0}")]
    Segmentation(#[from] SegmentationError),

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Storage error")]
    Storage(#[from] StorageError),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors from the external segmentation collaborator
#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("Connection failed to segmentation service at {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("OCR failed (status {status}): {message}")]
    Ocr { status: u16, message: String },

    #[error("Segment extraction failed (status {status}): {message}")]
    Extraction { status: u16, message: String },

    #[error("Invalid response from segmentation service")]
    InvalidResponse {
        #[source]
        source: serde_json::Error,
    },
}

/// Embedding provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("No API key configured for user {user_id}")]
    MissingApiKey { user_id: String },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Embedding model not found: {model}")]
    ModelNotFound { model: String },

    #[error("Connection failed to embedding provider at {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Embedding request failed (status {status}): {message}")]
    Request { status: u16, message: String },

    #[error("Invalid response from embedding provider")]
    InvalidResponse {
        #[source]
        source: serde_json::Error,
    },
}

/// Vector store errors
#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Connection failed to vector store at {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Vector store request failed (status {status}): {message}")]
    Request { status: u16, message: String },

    #[error("Invalid response from vector store")]
    InvalidResponse {
        #[source]
        source: serde_json::Error,
    },
}

impl VectorStoreError {
    /// Whether this error indicates an embedding dimension mismatch with the
    /// target collection (the model changed since the collection was created).
    pub fn is_dimension_mismatch(&self) -> bool {
        match self {
            VectorStoreError::Request { message, .. } => {
                message.to_lowercase().contains("dimension")
            }
            _ => false,
        }
    }
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),
}

/// Embedding pipeline errors
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("No embedding settings configured for user {user_id}")]
    SettingsMissing { user_id: String },

    #[error("No valid segments to embed for document {document_id}")]
    NoValidSegments { document_id: String },

    #[error("Embedding generation failed: {message}")]
    Generation { message: String },
}

/// On-disk artifact storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error")]
    Io(#[source] std::io::Error),

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),
}

/// API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::DocumentNotFound { .. } | ServiceError::EmbeddingJobNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            ServiceError::InvalidStatus { .. } | ServiceError::InvalidRequest { .. } => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Provider(ProviderError::MissingApiKey { .. })
            | ServiceError::Config { .. }
            | ServiceError::Embedding(EmbeddingError::SettingsMissing { .. })
            | ServiceError::Embedding(EmbeddingError::NoValidSegments { .. }) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Provider(ProviderError::Authentication { .. }) => {
                StatusCode::UNAUTHORIZED
            }
            ServiceError::Provider(ProviderError::ModelNotFound { .. }) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::DocumentNotFound { .. } => "document_not_found",
            ServiceError::EmbeddingJobNotFound { .. } => "embedding_job_not_found",
            ServiceError::InvalidStatus { .. } => "invalid_status",
            ServiceError::Segmentation(SegmentationError::Connection { .. }) => {
                "segmentation_connection"
            }
            ServiceError::Segmentation(SegmentationError::Ocr { .. }) => "ocr_failed",
            ServiceError::Segmentation(SegmentationError::Extraction { .. }) => {
                "segment_extraction_failed"
            }
            ServiceError::Segmentation(SegmentationError::InvalidResponse { .. }) => {
                "segmentation_invalid_response"
            }
            ServiceError::Provider(ProviderError::MissingApiKey { .. }) => "missing_api_key",
            ServiceError::Provider(ProviderError::Authentication { .. }) => "provider_auth_failed",
            ServiceError::Provider(ProviderError::ModelNotFound { .. }) => "model_not_found",
            ServiceError::Provider(_) => "provider_error",
            ServiceError::VectorStore(_) => "vector_store_error",
            ServiceError::Database(_) => "database_error",
            ServiceError::Embedding(EmbeddingError::SettingsMissing { .. }) => "settings_missing",
            ServiceError::Embedding(EmbeddingError::NoValidSegments { .. }) => "no_valid_segments",
            ServiceError::Embedding(_) => "embedding_error",
            ServiceError::Storage(_) => "storage_error",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().to_string();

        let response = ErrorResponse {
            message: self.to_string(),
            code: Some(code),
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_detection() {
        let err = VectorStoreError::Request {
            status: 400,
            message: "Embedding dimension 768 does not match collection dimensionality 1536"
                .to_string(),
        };
        assert!(err.is_dimension_mismatch());

        let err = VectorStoreError::Request {
            status: 500,
            message: "internal error".to_string(),
        };
        assert!(!err.is_dimension_mismatch());
    }

    #[test]
    fn test_status_codes() {
        let err = ServiceError::DocumentNotFound {
            document_id: "abc".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = ServiceError::Provider(ProviderError::Authentication {
            message: "bad key".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = ServiceError::Embedding(EmbeddingError::SettingsMissing {
            user_id: "u1".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
