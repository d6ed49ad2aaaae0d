//! Database schema migrations.
//!
//! This module contains all database migrations and schema setup.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Run all database migrations.
///
/// This function is called during database initialization to ensure
/// the schema is up to date.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    // Initial schema setup
    conn.execute_batch(
        r#"
        -- Uploaded documents and their segmentation lifecycle
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            file_size INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'waiting',
            error_message TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            processed_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_documents_user ON documents(user_id);
        CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status, created_at);

        -- Embedding jobs, one per (user, document)
        CREATE TABLE IF NOT EXISTS embedding_jobs (
            user_id TEXT NOT NULL,
            file_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'processing',
            total_chunks INTEGER NOT NULL DEFAULT 0,
            completed_chunks INTEGER NOT NULL DEFAULT 0,
            provider TEXT NOT NULL,
            model_name TEXT NOT NULL,
            error_message TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, file_id)
        );

        CREATE INDEX IF NOT EXISTS idx_embedding_jobs_status ON embedding_jobs(user_id, status);

        -- Per-user embedding provider settings
        CREATE TABLE IF NOT EXISTS embedding_settings (
            user_id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            model_name TEXT NOT NULL,
            api_key TEXT,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Chat session placeholders created after segmentation completes
        CREATE TABLE IF NOT EXISTS chat_sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            file_id TEXT,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_chat_sessions_user ON chat_sessions(user_id);
    "#,
    )
    .map_err(|e| DatabaseError::Migration {
        message: e.to_string(),
    })?;

    // SQLite doesn't have IF NOT EXISTS for ALTER TABLE, so column additions
    // are guarded by pragma_table_info checks
    run_language_migration(conn)?;

    Ok(())
}

/// Migration: Add language and ocr columns to documents tables created
/// before OCR support was added
fn run_language_migration(conn: &Connection) -> ServiceResult<()> {
    let has_language: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('documents') WHERE name='language'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0)
        > 0;

    if !has_language {
        conn.execute_batch(
            r#"
            ALTER TABLE documents ADD COLUMN language TEXT NOT NULL DEFAULT 'en';
            ALTER TABLE documents ADD COLUMN ocr INTEGER NOT NULL DEFAULT 0;
            "#,
        )
        .map_err(|e| DatabaseError::Migration {
            message: format!("Failed to add language columns: {}", e),
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn language_column_count(conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM pragma_table_info('documents') \
             WHERE name IN ('language', 'ocr')",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_language_migration_backfills_columns() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(language_column_count(&conn), 2);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(language_column_count(&conn), 2);
    }
}
