// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! File-backed snapshot store.
//!
//! Each persist writes the full document to a uniquely named temp file next
//! to the target, syncs it, then renames it over the target. Rename within
//! one directory is atomic, so readers never observe a partial document.
//! Writers from the same store are serialized; across processes the last
//! rename wins.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::traits::{SnapshotStore, StorageError};
use crate::snapshot::{document_checksum, Snapshot};

pub struct FileSnapshotStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        self.parent_dir()
            .join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
    }

    async fn write_and_replace(&self, document: &[u8]) -> Result<(), StorageError> {
        let dir = self.parent_dir();
        tokio::fs::create_dir_all(&dir).await?;

        let tmp = self.temp_path();
        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(document).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                debug!(tmp = %tmp.display(), error = %cleanup, "Temp file cleanup failed");
            }
            return Err(e.into());
        }

        // Make the rename itself durable. Not every platform lets a
        // directory be opened for syncing.
        if let Ok(dir_handle) = tokio::fs::File::open(&dir).await {
            if let Err(e) = dir_handle.sync_all().await {
                debug!(dir = %dir.display(), error = %e, "Directory sync skipped");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let start = Instant::now();
        let document = snapshot.to_document()?;

        let _guard = self.write_lock.lock().await;
        if let Err(e) = self.write_and_replace(&document).await {
            warn!(path = %self.path.display(), error = %e, "Snapshot write failed");
            crate::metrics::record_persist_error(self.kind());
            return Err(e);
        }

        info!(
            path = %self.path.display(),
            bytes = document.len(),
            checksum = %document_checksum(&document),
            "Snapshot persisted"
        );
        crate::metrics::record_persist(self.kind(), document.len(), start.elapsed());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(Snapshot::from_document(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn kind(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{TransactionRecord, UserRecord};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn snapshot(ts: i64, names: &[&str]) -> Snapshot {
        let users = names
            .iter()
            .enumerate()
            .map(|(i, n)| UserRecord::new(i as u64 + 1, *n))
            .collect();
        Snapshot::new(ts, users, vec![TransactionRecord::new(101, 1, 50.0)])
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("data.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_then_load() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("data.json"));
        let snap = snapshot(1, &["Ana", "Carlos"]);

        store.persist(&snap).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(snap));
    }

    #[tokio::test]
    async fn test_second_persist_fully_overwrites_first() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = FileSnapshotStore::new(&path);
        let a = snapshot(1, &["Ana", "Carlos", "Dora"]);
        let b = snapshot(2, &["Eve"]);

        store.persist(&a).await.unwrap();
        store.persist(&b).await.unwrap();

        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(on_disk, b.to_document().unwrap());
    }

    #[tokio::test]
    async fn test_persisting_same_snapshot_is_byte_identical() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = FileSnapshotStore::new(&path);
        let snap = snapshot(5, &["Ana"]);

        store.persist(&snap).await.unwrap();
        let first = std::fs::read(&path).unwrap();
        store.persist(&snap).await.unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("data.json"));
        store.persist(&snapshot(1, &["Ana"])).await.unwrap();
        store.persist(&snapshot(2, &["Ana"])).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nested/deeper/data.json"));
        store.persist(&snapshot(1, &["Ana"])).await.unwrap();
        assert!(store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_write_onto_directory_fails_cleanly() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("occupied");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), b"x").unwrap();

        let store = FileSnapshotStore::new(&target);
        let result = store.persist(&snapshot(1, &["Ana"])).await;
        assert!(matches!(result, Err(StorageError::Io(_))));

        // Only the pre-existing directory remains; the temp file was removed.
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_leave_one_whole_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = Arc::new(FileSnapshotStore::new(&path));

        let snapshots: Vec<Snapshot> = (0..16).map(|i| snapshot(i, &["Ana", "Carlos"])).collect();
        let mut handles = Vec::new();
        for snap in snapshots.clone() {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.persist(&snap).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = store.load().await.unwrap().unwrap();
        assert!(snapshots.contains(&stored));
    }
}
