//! Per-user embedding settings storage.

use rusqlite::{OptionalExtension, params};

use super::Database;
use super::models::EmbeddingSettings;
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Get a user's embedding settings
    pub fn get_embedding_settings(&self, user_id: &str) -> ServiceResult<Option<EmbeddingSettings>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT user_id, provider, model_name, api_key, updated_at \
             FROM embedding_settings WHERE user_id = ?1",
            params![user_id],
            EmbeddingSettings::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Create or update a user's embedding settings
    pub fn set_embedding_settings(&self, settings: &EmbeddingSettings) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO embedding_settings (user_id, provider, model_name, api_key, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(user_id) DO UPDATE SET provider = excluded.provider, \
             model_name = excluded.model_name, api_key = excluded.api_key, \
             updated_at = excluded.updated_at",
            params![
                settings.user_id,
                settings.provider.to_string(),
                settings.model_name,
                settings.api_key,
                settings.updated_at.to_rfc3339(),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, EmbeddingSettings, ProviderKind};
    use chrono::Utc;

    #[test]
    fn test_settings_upsert() {
        let db = Database::open_in_memory().unwrap();

        assert!(db.get_embedding_settings("u1").unwrap().is_none());

        let mut settings = EmbeddingSettings {
            user_id: "u1".to_string(),
            provider: ProviderKind::Local,
            model_name: "nomic-embed-text".to_string(),
            api_key: None,
            updated_at: Utc::now(),
        };
        db.set_embedding_settings(&settings).unwrap();

        settings.provider = ProviderKind::Remote;
        settings.model_name = "text-embedding-3-small".to_string();
        settings.api_key = Some("sk-test".to_string());
        db.set_embedding_settings(&settings).unwrap();

        let stored = db.get_embedding_settings("u1").unwrap().unwrap();
        assert_eq!(stored.provider, ProviderKind::Remote);
        assert_eq!(stored.model_name, "text-embedding-3-small");
        assert_eq!(stored.api_key.as_deref(), Some("sk-test"));
    }
}
