// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{SnapshotStore, StorageError};
use crate::snapshot::Snapshot;

/// Keeps the encoded document in memory. Each persist swaps the whole
/// buffer under a lock.
pub struct InMemorySnapshotStore {
    document: Mutex<Option<Vec<u8>>>,
    writes: AtomicU64,
}

impl InMemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            document: Mutex::new(None),
            writes: AtomicU64::new(0),
        }
    }

    /// Raw bytes of the stored document
    #[must_use]
    pub fn document(&self) -> Option<Vec<u8>> {
        self.document.lock().clone()
    }

    /// Number of successful persists
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.document.lock().is_none()
    }

    pub fn clear(&self) {
        *self.document.lock() = None;
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let start = Instant::now();
        let bytes = snapshot.to_document()?;
        let len = bytes.len();
        *self.document.lock() = Some(bytes);
        self.writes.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_persist(self.kind(), len, start.elapsed());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        let bytes = self.document.lock().clone();
        match bytes {
            Some(bytes) => Ok(Some(Snapshot::from_document(&bytes)?)),
            None => Ok(None),
        }
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{TransactionRecord, UserRecord};

    fn snap(ts: i64) -> Snapshot {
        Snapshot::new(ts, vec![UserRecord::new(1, "Ana")], vec![TransactionRecord::new(1, 1, 9.5)])
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = InMemorySnapshotStore::new();
        assert!(store.is_empty());
        assert_eq!(store.writes(), 0);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_and_load() {
        let store = InMemorySnapshotStore::new();
        store.persist(&snap(1)).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(snap(1)));
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_whole_document() {
        let store = InMemorySnapshotStore::new();
        store.persist(&snap(1)).await.unwrap();
        store.persist(&snap(2)).await.unwrap();

        assert_eq!(store.document().unwrap(), snap(2).to_document().unwrap());
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_snapshot_is_not_stored() {
        let store = InMemorySnapshotStore::new();
        store.persist(&snap(1)).await.unwrap();

        let bad = Snapshot::new(2, vec![], vec![TransactionRecord::new(1, 1, f64::NAN)]);
        let result = store.persist(&bad).await;

        assert!(matches!(result, Err(StorageError::Serialization(_))));
        assert_eq!(store.load().await.unwrap(), Some(snap(1)));
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemorySnapshotStore::new();
        store.persist(&snap(1)).await.unwrap();
        store.clear();
        assert!(store.is_empty());
    }
}
