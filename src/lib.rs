//! # Resilient Sync
//!
//! Pulls two related datasets from an unreliable remote source, merges them
//! into one snapshot and persists it atomically, tolerating failed and
//! hanging calls along the way.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     SyncOrchestrator                        │
//! │  • fetch users → fetch transactions → assemble → persist   │
//! │  • all-or-nothing: no partial snapshot is ever written     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                (each fetch wrapped by the invoker)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ResilientInvoker                        │
//! │  • races each attempt against a per-attempt timer          │
//! │  • single-resolution gate drops late responses             │
//! │  • bounded retries with constant (default) backoff         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SnapshotStore                          │
//! │  • File: temp file + fsync + atomic rename                 │
//! │  • SQL: single-row REPLACE (SQLite / MySQL)                │
//! │  • Memory: whole-buffer swap                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use resilient_sync::{SyncConfig, SyncOrchestrator, SimulatedSource, FileSnapshotStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SyncConfig::default();
//!     let orchestrator = SyncOrchestrator::from_config(
//!         &config,
//!         Arc::new(SimulatedSource::default()),
//!         Arc::new(FileSnapshotStore::new(&config.snapshot_path)),
//!     )
//!     .expect("valid config");
//!
//!     let mut progress = orchestrator.progress().subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = progress.recv().await {
//!             println!("{}", event);
//!         }
//!     });
//!
//!     match orchestrator.run().await {
//!         Ok(snapshot) => println!("saved {} users", snapshot.users().len()),
//!         Err(e) => eprintln!("sync aborted: {}", e),
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`SyncOrchestrator`] sequencing a run
//! - [`resilience`]: Retry policy and the timed, retried invoker
//! - [`storage`]: Snapshot stores (file, SQL, memory)
//! - [`source`]: The remote source trait and a simulated source
//! - [`progress`]: Operator-facing progress stream
//! - [`metrics`]: `metrics` crate instrumentation

pub mod config;
pub mod error;
pub mod clock;
pub mod records;
pub mod snapshot;
pub mod source;
pub mod storage;
pub mod resilience;
pub mod progress;
pub mod coordinator;
pub mod metrics;

pub use config::SyncConfig;
pub use error::{AttemptFailure, SyncError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use records::{TransactionRecord, UserRecord};
pub use snapshot::Snapshot;
pub use source::{RemoteSource, SimulatedSource, SimulatedSourceConfig, SourceError};
pub use storage::{FileSnapshotStore, InMemorySnapshotStore, SnapshotStore, SqlSnapshotStore, StorageError};
pub use resilience::{AttemptOutcome, Backoff, RaceGate, ResilientInvoker, RetryPolicy};
pub use progress::{Outcome, ProgressEvent, ProgressReporter};
pub use coordinator::{FetchMode, RunState, RunStats, SyncOrchestrator};
pub use metrics::LatencyTimer;
