//! Client for the external segmentation service.
//!
//! The collaborator is treated as a black box: it accepts a document upload
//! and returns an ordered list of layout segments, with an optional OCR pass
//! for scanned documents. Jobs can take minutes, so the client carries a
//! long request timeout.

use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};

use crate::config::SegmentationConfig;
use crate::error::{SegmentationError, ServiceError, ServiceResult};
use crate::segments::Segment;

/// Segmentation service client
pub struct SegmentationClient {
    client: Client,
    base_url: String,
}

impl SegmentationClient {
    /// Create a new segmentation client
    pub fn new(config: &SegmentationConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                ServiceError::Segmentation(SegmentationError::Connection {
                    url: config.base_url.clone(),
                    source: e,
                })
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Run OCR over a document, returning the OCR'd file bytes
    pub async fn ocr(
        &self,
        content: Vec<u8>,
        filename: &str,
        language: &str,
    ) -> Result<Bytes, SegmentationError> {
        let url = format!("{}/ocr", self.base_url);

        let part = Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str(mime::APPLICATION_OCTET_STREAM.as_ref())
            .map_err(|e| SegmentationError::Connection {
                url: url.clone(),
                source: e,
            })?;
        let form = Form::new()
            .part("file", part)
            .text("language", language.to_string());

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SegmentationError::Connection {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(SegmentationError::Ocr { status, message });
        }

        response.bytes().await.map_err(|e| SegmentationError::Connection {
            url,
            source: e,
        })
    }

    /// Extract layout segments from a document
    pub async fn extract(
        &self,
        content: Vec<u8>,
        filename: &str,
    ) -> Result<Vec<Segment>, SegmentationError> {
        let url = format!("{}/", self.base_url);

        let part = Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str(mime::APPLICATION_OCTET_STREAM.as_ref())
            .map_err(|e| SegmentationError::Connection {
                url: url.clone(),
                source: e,
            })?;
        // The fast path skips the layout model and degrades segment quality
        let form = Form::new().part("file", part).text("fast", "false");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SegmentationError::Connection {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(SegmentationError::Extraction { status, message });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SegmentationError::Connection { url, source: e })?;

        serde_json::from_str(&body).map_err(|e| SegmentationError::InvalidResponse { source: e })
    }
}
