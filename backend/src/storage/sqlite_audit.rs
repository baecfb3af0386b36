//! SQLite Audit Log Storage
//!
//! Append-only event documents. The free-form `details` document is stored
//! as JSON text so entries keep whatever shape the writer gave them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use rusqlite::types::Type;
use std::path::Path;

use super::sqlite::{db_err, file_pool, memory_pool};
use super::traits::{AuditStore, StorageError, StorageResult};
use crate::types::{AuditEvent, AuditLogEntry};

/// SQLite-backed audit log
pub struct SqliteAuditStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAuditStore {
    /// Open (and migrate) the audit database at `db_path`
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        let store = Self {
            pool: file_pool(db_path)?,
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let store = Self {
            pool: memory_pool()?,
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                user_id INTEGER,
                source_address TEXT,
                details TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_event ON audit_log(event);
            CREATE INDEX IF NOT EXISTS idx_audit_user ON audit_log(user_id);
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<AuditLogEntry> {
        let event: String = row.get("event")?;
        let event = event.parse::<AuditEvent>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;

        let timestamp: String = row.get("timestamp")?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?
            .with_timezone(&Utc);

        let details: String = row.get("details")?;
        let details = serde_json::from_str(&details)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

        Ok(AuditLogEntry {
            event,
            timestamp,
            user_id: row.get("user_id")?,
            source_address: row.get("source_address")?,
            details,
        })
    }

    fn append_sync(&self, entry: &AuditLogEntry) -> Result<(), StorageError> {
        let details = serde_json::to_string(&entry.details)
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO audit_log (event, timestamp, user_id, source_address, details)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                entry.event.as_str(),
                entry.timestamp.to_rfc3339(),
                entry.user_id,
                entry.source_address,
                details,
            ],
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn recent_sync(&self, limit: usize) -> Result<Vec<AuditLogEntry>, StorageError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT * FROM audit_log ORDER BY id DESC LIMIT ?1")
            .map_err(db_err)?;

        let entries = stmt
            .query_map(params![limit as i64], |row| Self::row_to_entry(row))
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(entries)
    }
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn append(&self, entry: &AuditLogEntry) -> StorageResult<()> {
        self.append_sync(entry)
    }

    async fn recent(&self, limit: usize) -> StorageResult<Vec<AuditLogEntry>> {
        self.recent_sync(limit)
    }
}
