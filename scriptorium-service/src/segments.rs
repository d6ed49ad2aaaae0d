//! Segment model and on-disk artifact storage.
//!
//! The segmentation collaborator produces an ordered list of layout segments
//! per document. Segments are persisted as a JSON file next to the original
//! upload, under a per-user/per-document directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ServiceResult, StorageError};

/// Segment types excluded from embedding
const EXCLUDED_SEGMENT_TYPES: &[&str] = &["Page header", "Page footer"];

/// One layout-extracted region of a document page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "type", default)]
    pub segment_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub page_number: u32,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub page_width: f64,
    #[serde(default)]
    pub page_height: f64,
}

impl Segment {
    /// Whether this segment carries indexable text.
    ///
    /// Headers and footers repeat on every page and would pollute the index;
    /// empty segments have nothing to embed.
    pub fn is_valid(&self) -> bool {
        !self.text.trim().is_empty()
            && !EXCLUDED_SEGMENT_TYPES.contains(&self.segment_type.as_str())
    }
}

/// File-backed store for per-document artifacts: the original upload, the
/// OCR'd copy, and the extracted segment list.
pub struct SegmentStore {
    base_dir: PathBuf,
}

impl SegmentStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            base_dir: data_dir.join("uploads"),
        }
    }

    /// Directory holding all artifacts for one document
    pub fn document_dir(&self, user_id: &str, file_id: &str) -> PathBuf {
        self.base_dir.join(user_id).join(file_id)
    }

    pub fn original_path(&self, user_id: &str, file_id: &str, filename: &str) -> PathBuf {
        self.document_dir(user_id, file_id)
            .join(format!("original_{filename}"))
    }

    pub fn ocr_path(&self, user_id: &str, file_id: &str, filename: &str) -> PathBuf {
        self.document_dir(user_id, file_id)
            .join(format!("ocr_{filename}"))
    }

    pub fn segments_path(&self, user_id: &str, file_id: &str, filename: &str) -> PathBuf {
        self.document_dir(user_id, file_id)
            .join(format!("segments_{filename}.json"))
    }

    /// Persist the uploaded file, creating the document directory
    pub fn save_original(
        &self,
        user_id: &str,
        file_id: &str,
        filename: &str,
        content: &[u8],
    ) -> ServiceResult<PathBuf> {
        let dir = self.document_dir(user_id, file_id);
        std::fs::create_dir_all(&dir).map_err(StorageError::Io)?;

        let path = self.original_path(user_id, file_id, filename);
        std::fs::write(&path, content).map_err(StorageError::Io)?;
        Ok(path)
    }

    pub fn read_original(
        &self,
        user_id: &str,
        file_id: &str,
        filename: &str,
    ) -> ServiceResult<Vec<u8>> {
        let path = self.original_path(user_id, file_id, filename);
        Ok(std::fs::read(&path).map_err(StorageError::Io)?)
    }

    pub fn original_exists(&self, user_id: &str, file_id: &str, filename: &str) -> bool {
        self.original_path(user_id, file_id, filename).exists()
    }

    /// Persist the OCR'd copy of the original
    pub fn save_ocr(
        &self,
        user_id: &str,
        file_id: &str,
        filename: &str,
        content: &[u8],
    ) -> ServiceResult<PathBuf> {
        let path = self.ocr_path(user_id, file_id, filename);
        std::fs::write(&path, content).map_err(StorageError::Io)?;
        Ok(path)
    }

    /// Persist the extracted segment list as JSON
    pub fn save_segments(
        &self,
        user_id: &str,
        file_id: &str,
        filename: &str,
        segments: &[Segment],
    ) -> ServiceResult<()> {
        let path = self.segments_path(user_id, file_id, filename);
        let json = serde_json::to_string(segments).map_err(StorageError::Serialization)?;
        std::fs::write(&path, json).map_err(StorageError::Io)?;
        Ok(())
    }

    /// Load the persisted segment list for a document
    pub fn load_segments(
        &self,
        user_id: &str,
        file_id: &str,
        filename: &str,
    ) -> ServiceResult<Vec<Segment>> {
        let path = self.segments_path(user_id, file_id, filename);
        let json = std::fs::read_to_string(&path).map_err(StorageError::Io)?;
        Ok(serde_json::from_str(&json).map_err(StorageError::Serialization)?)
    }

    /// Remove all artifacts for a document. Missing directory is fine.
    pub fn remove_document(&self, user_id: &str, file_id: &str) -> bool {
        let dir = self.document_dir(user_id, file_id);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(
                    path = %dir.display(),
                    error = %e,
                    "Failed to remove document artifacts"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn segment(segment_type: &str, text: &str) -> Segment {
        Segment {
            segment_type: segment_type.to_string(),
            text: text.to_string(),
            page_number: 1,
            left: 0.0,
            top: 0.0,
            width: 100.0,
            height: 20.0,
            page_width: 612.0,
            page_height: 792.0,
        }
    }

    #[test]
    fn test_segment_validity() {
        assert!(segment("Text", "Some body text").is_valid());
        assert!(segment("Section header", "Chapter 1").is_valid());

        assert!(!segment("Text", "").is_valid());
        assert!(!segment("Text", "   \n\t ").is_valid());
        assert!(!segment("Page header", "Running head").is_valid());
        assert!(!segment("Page footer", "Page 3").is_valid());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::new(dir.path());

        store
            .save_original("u1", "f1", "doc.pdf", b"%PDF-1.4")
            .unwrap();
        assert!(store.original_exists("u1", "f1", "doc.pdf"));
        assert_eq!(store.read_original("u1", "f1", "doc.pdf").unwrap(), b"%PDF-1.4");

        let segments = vec![segment("Text", "hello"), segment("Page footer", "1")];
        store.save_segments("u1", "f1", "doc.pdf", &segments).unwrap();

        let loaded = store.load_segments("u1", "f1", "doc.pdf").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].text, "hello");
        assert_eq!(loaded[1].segment_type, "Page footer");
    }

    #[test]
    fn test_remove_document() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::new(dir.path());

        store
            .save_original("u1", "f1", "doc.pdf", b"content")
            .unwrap();
        assert!(store.remove_document("u1", "f1"));
        assert!(!store.original_exists("u1", "f1", "doc.pdf"));

        // Second removal is a no-op
        assert!(!store.remove_document("u1", "f1"));
    }

    #[test]
    fn test_deserializes_collaborator_payload() {
        let json = r#"[{
            "type": "Text",
            "text": "Body",
            "page_number": 2,
            "left": 10.5,
            "top": 20.0,
            "width": 500.0,
            "height": 12.0,
            "page_width": 612.0,
            "page_height": 792.0
        }]"#;
        let segments: Vec<Segment> = serde_json::from_str(json).unwrap();
        assert_eq!(segments[0].segment_type, "Text");
        assert_eq!(segments[0].page_number, 2);
    }
}
