//! SQLite persistence for data sources and metric rows.
//!
//! # Schema
//! ```sql
//! CREATE TABLE data_sources (
//!     id             TEXT PRIMARY KEY,
//!     user_id        TEXT NOT NULL,
//!     platform       TEXT NOT NULL,
//!     status         TEXT NOT NULL,
//!     credentials    TEXT NOT NULL,   -- JSON bundle, token fields encrypted
//!     last_synced_at TEXT,            -- RFC 3339
//!     created_at     TEXT NOT NULL,
//!     updated_at     TEXT NOT NULL,
//!     UNIQUE(user_id, platform)
//! );
//!
//! CREATE TABLE metrics (
//!     id          TEXT PRIMARY KEY,
//!     user_id     TEXT NOT NULL,
//!     source_id   TEXT NOT NULL,
//!     metric_type TEXT NOT NULL,
//!     metric_name TEXT,
//!     value       REAL NOT NULL,
//!     date        TEXT NOT NULL,     -- YYYY-MM-DD
//!     metadata    TEXT,              -- JSON
//!     created_at  TEXT NOT NULL
//! );
//! ```
//!
//! `metrics` has no uniqueness constraint. One row per
//! (user, source, metric type, date) is kept by [`Store::replace_metrics`],
//! which deletes every row for the incoming dates before inserting, inside
//! one transaction.
//!
//! # Thread Safety
//! The connection is wrapped in a `Mutex`. Calls block; async callers that
//! write large batches should go through `tokio::task::spawn_blocking`.

mod metrics;
mod sources;


use anyhow::Context;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("data source '{0}' not found")]
    NotFound(String),

    #[error("data source '{id}' does not hold {expected} credentials")]
    ProviderMismatch { id: String, expected: &'static str },

    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },

    #[error("failed to serialize column: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Relational store for `data_sources` and `metrics`.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (or creates) the database and ensures the schema exists.
    ///
    /// Pass `":memory:"` for a throwaway store.
    pub fn open<P: AsRef<Path>>(db_path: P) -> anyhow::Result<Self> {
        let path = db_path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_tables().context("Failed to create schema")?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS data_sources (
                id             TEXT PRIMARY KEY,
                user_id        TEXT NOT NULL,
                platform       TEXT NOT NULL,
                status         TEXT NOT NULL,
                credentials    TEXT NOT NULL,
                last_synced_at TEXT,
                created_at     TEXT NOT NULL,
                updated_at     TEXT NOT NULL,
                UNIQUE(user_id, platform)
            );
            CREATE TABLE IF NOT EXISTS metrics (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                source_id   TEXT NOT NULL,
                metric_type TEXT NOT NULL,
                metric_name TEXT,
                value       REAL NOT NULL,
                date        TEXT NOT NULL,
                metadata    TEXT,
                created_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sources_user ON data_sources(user_id, status);
            CREATE INDEX IF NOT EXISTS idx_metrics_source_date ON metrics(user_id, source_id, date);",
        )?;
        Ok(())
    }
}
