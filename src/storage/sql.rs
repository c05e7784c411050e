// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL snapshot store (SQLite or MySQL through sqlx's `Any` driver).
//!
//! The whole document lives in one row keyed by a slot name:
//! ```sql
//! CREATE TABLE sync_snapshots (
//!   slot VARCHAR(255) PRIMARY KEY,
//!   timestamp BIGINT NOT NULL,   -- snapshot timestamp (epoch millis)
//!   checksum VARCHAR(64) NOT NULL, -- hex SHA-256 of document
//!   document LONGTEXT NOT NULL,  -- the JSON document
//!   updated_at BIGINT NOT NULL   -- wall clock of the write
//! )
//! ```
//!
//! A persist is a single `REPLACE INTO` statement, so the row flips from
//! the old document to the new one in one step.
//!
//! ## sqlx Any Driver Quirks
//!
//! The `Any` driver hands MySQL LONGTEXT back as bytes, so text columns are
//! read as `String` first and as `Vec<u8>` second.

use std::sync::Once;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use tracing::{info, warn};

use super::traits::{SnapshotStore, StorageError};
use crate::clock::{Clock, SystemClock};
use crate::resilience::{ResilientInvoker, RetryPolicy};
use crate::snapshot::{document_checksum, Snapshot};

/// Slot used when none is given.
pub const DEFAULT_SLOT: &str = "latest";

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

pub struct SqlSnapshotStore {
    pool: AnyPool,
    is_sqlite: bool,
    slot: String,
}

impl SqlSnapshotStore {
    /// Connect with startup-mode retry (fails fast if config is wrong).
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        Self::with_slot(connection_string, DEFAULT_SLOT).await
    }

    pub async fn with_slot(connection_string: &str, slot: &str) -> Result<Self, StorageError> {
        install_drivers();

        let is_sqlite = connection_string.starts_with("sqlite:");
        let url = connection_string.to_string();

        let pool = ResilientInvoker::default()
            .execute("sql_connect", &RetryPolicy::startup(), move || {
                let url = url.clone();
                async move {
                    AnyPoolOptions::new()
                        .max_connections(5)
                        .acquire_timeout(Duration::from_secs(10))
                        .idle_timeout(Duration::from_secs(300))
                        .connect(&url)
                        .await
                }
            })
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let store = Self { pool, is_sqlite, slot: slot.to_string() };

        if is_sqlite {
            store.enable_wal_mode().await?;
        }
        store.init_schema().await?;
        info!(slot = %store.slot, sqlite = is_sqlite, "SQL snapshot store ready");
        Ok(store)
    }

    /// Get a clone of the connection pool for sharing with other stores.
    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    #[must_use]
    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// Enable WAL mode for SQLite so readers don't block the writer.
    async fn enable_wal_mode(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to enable WAL mode: {}", e)))?;

        sqlx::query("PRAGMA synchronous = FULL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to set synchronous mode: {}", e)))?;

        Ok(())
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let sql = if self.is_sqlite {
            r#"
            CREATE TABLE IF NOT EXISTS sync_snapshots (
                slot TEXT PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                checksum TEXT NOT NULL,
                document TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#
        } else {
            r#"
            CREATE TABLE IF NOT EXISTS sync_snapshots (
                slot VARCHAR(255) PRIMARY KEY,
                timestamp BIGINT NOT NULL,
                checksum VARCHAR(64) NOT NULL,
                document LONGTEXT NOT NULL,
                updated_at BIGINT NOT NULL
            )
            "#
        };

        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to create schema: {}", e)))?;
        Ok(())
    }

    /// Checksum recorded with the stored document, if any.
    pub async fn stored_checksum(&self) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT checksum FROM sync_snapshots WHERE slot = ?")
            .bind(&self.slot)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(row.and_then(|r| read_text(&r, "checksum")))
    }
}

/// Read a text column as `String`, falling back to bytes (MySQL LONGTEXT).
fn read_text(row: &AnyRow, column: &str) -> Option<String> {
    row.try_get::<String, _>(column).ok().or_else(|| {
        row.try_get::<Vec<u8>, _>(column)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    })
}

#[async_trait]
impl SnapshotStore for SqlSnapshotStore {
    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let start = Instant::now();
        let document = snapshot.to_document()?;
        let checksum = document_checksum(&document);
        let text = String::from_utf8(document)
            .map_err(|e| StorageError::Backend(format!("Document is not UTF-8: {}", e)))?;
        let bytes = text.len();

        let result = sqlx::query(
            "REPLACE INTO sync_snapshots (slot, timestamp, checksum, document, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&self.slot)
        .bind(snapshot.timestamp())
        .bind(&checksum)
        .bind(text)
        .bind(SystemClock.now_millis())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(slot = %self.slot, error = %e, "Snapshot write failed");
            crate::metrics::record_persist_error(self.kind());
            return Err(StorageError::Backend(e.to_string()));
        }

        info!(slot = %self.slot, bytes, checksum = %checksum, "Snapshot persisted");
        crate::metrics::record_persist(self.kind(), bytes, start.elapsed());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        let row = sqlx::query("SELECT checksum, document FROM sync_snapshots WHERE slot = ?")
            .bind(&self.slot)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let document = read_text(&row, "document")
            .ok_or_else(|| StorageError::Backend("document column unreadable".into()))?;
        let expected = read_text(&row, "checksum").unwrap_or_default();
        let actual = document_checksum(document.as_bytes());
        if expected != actual {
            return Err(StorageError::Corruption { expected, actual });
        }

        Ok(Some(Snapshot::from_document(document.as_bytes())?))
    }

    fn kind(&self) -> &'static str {
        "sql"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{TransactionRecord, UserRecord};
    use tempfile::tempdir;

    fn snap(ts: i64, name: &str) -> Snapshot {
        Snapshot::new(
            ts,
            vec![UserRecord::new(1, name).with_attr("role", "admin")],
            vec![TransactionRecord::new(101, 1, 50.0)],
        )
    }

    fn sqlite_url(dir: &tempfile::TempDir) -> String {
        format!("sqlite://{}?mode=rwc", dir.path().join("snapshots.db").display())
    }

    #[tokio::test]
    async fn test_empty_store_loads_none() {
        let dir = tempdir().unwrap();
        let store = SqlSnapshotStore::new(&sqlite_url(&dir)).await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        assert!(store.stored_checksum().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_overwrites_single_row() {
        let dir = tempdir().unwrap();
        let store = SqlSnapshotStore::new(&sqlite_url(&dir)).await.unwrap();

        store.persist(&snap(1, "Ana")).await.unwrap();
        store.persist(&snap(2, "Carlos")).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(snap(2, "Carlos")));

        let count: i64 = sqlx::query("SELECT COUNT(*) AS cnt FROM sync_snapshots")
            .fetch_one(&store.pool())
            .await
            .unwrap()
            .try_get("cnt")
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_checksum_recorded() {
        let dir = tempdir().unwrap();
        let store = SqlSnapshotStore::new(&sqlite_url(&dir)).await.unwrap();
        let snapshot = snap(7, "Ana");

        store.persist(&snapshot).await.unwrap();
        assert_eq!(store.stored_checksum().await.unwrap(), Some(snapshot.checksum().unwrap()));
    }

    #[tokio::test]
    async fn test_tampered_document_detected() {
        let dir = tempdir().unwrap();
        let store = SqlSnapshotStore::new(&sqlite_url(&dir)).await.unwrap();
        store.persist(&snap(1, "Ana")).await.unwrap();

        sqlx::query("UPDATE sync_snapshots SET document = ? WHERE slot = ?")
            .bind(String::from_utf8(snap(1, "Mallory").to_document().unwrap()).unwrap())
            .bind(DEFAULT_SLOT)
            .execute(&store.pool())
            .await
            .unwrap();

        assert!(matches!(store.load().await, Err(StorageError::Corruption { .. })));
    }

    #[tokio::test]
    async fn test_slots_are_independent() {
        let dir = tempdir().unwrap();
        let url = sqlite_url(&dir);
        let a = SqlSnapshotStore::with_slot(&url, "a").await.unwrap();
        let b = SqlSnapshotStore::with_slot(&url, "b").await.unwrap();

        a.persist(&snap(1, "Ana")).await.unwrap();
        assert!(b.load().await.unwrap().is_none());
        assert_eq!(a.slot(), "a");
    }
}
