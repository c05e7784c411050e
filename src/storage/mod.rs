// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Snapshot storage backends (file, SQL, memory).

pub mod traits;
pub mod file;
pub mod memory;
pub mod sql;

pub use traits::{SnapshotStore, StorageError};
pub use file::FileSnapshotStore;
pub use memory::InMemorySnapshotStore;
pub use sql::SqlSnapshotStore;
