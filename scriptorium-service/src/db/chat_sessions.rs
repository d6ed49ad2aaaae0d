//! Chat session placeholder storage.
//!
//! Segmentation completion creates an initial session row per document so
//! the chat frontend has something to attach to. Creation is best-effort.

use rusqlite::params;

use super::Database;
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Insert an initial chat session for a processed document
    pub fn insert_chat_session(
        &self,
        user_id: &str,
        file_id: &str,
        title: &str,
    ) -> ServiceResult<String> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO chat_sessions (id, user_id, file_id, title, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                user_id,
                file_id,
                title,
                chrono::Utc::now().to_rfc3339()
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(id)
    }
}
