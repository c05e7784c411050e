// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

use crate::snapshot::Snapshot;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Stored document is corrupt: expected checksum {expected}, got {actual}")]
    Corruption { expected: String, actual: String },
}

/// Durable home of the latest snapshot.
///
/// `persist` replaces the stored document as one unit: a concurrent reader
/// sees either the previous document or the new one, never a mix. Writes
/// are not retried here; that is the caller's call.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Overwrite the stored document with `snapshot`.
    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StorageError>;

    /// Read back the stored document, if any.
    async fn load(&self) -> Result<Option<Snapshot>, StorageError>;

    /// Short backend label for logs and metrics.
    fn kind(&self) -> &'static str;
}
