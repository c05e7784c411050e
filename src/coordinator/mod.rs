// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync orchestrator.
//!
//! The [`SyncOrchestrator`] turns two resilient fetches and one write into a
//! single all-or-nothing run:
//!
//! ```text
//! Idle → FetchingPrimary → FetchingSecondary → Persisting → Completed
//!              │                   │                │
//!              └───────────────────┴────────────────┴──→ Failed
//! ```
//!
//! A snapshot is only assembled once both fetches have succeeded, so a
//! failed run never writes anything.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use resilient_sync::{SyncOrchestrator, RetryPolicy, SimulatedSource, FileSnapshotStore};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let orchestrator = SyncOrchestrator::new(
//!     Arc::new(SimulatedSource::default()),
//!     Arc::new(FileSnapshotStore::new("./local_data.json")),
//!     RetryPolicy::standard(),
//! );
//!
//! match orchestrator.run().await {
//!     Ok(snapshot) => println!("synced {} users", snapshot.users().len()),
//!     Err(e) => eprintln!("sync failed: {}", e),
//! }
//! # }
//! ```

mod types;
mod run;

pub use types::{FetchMode, RunState, RunStats};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::progress::ProgressReporter;
use crate::resilience::{ResilientInvoker, RetryPolicy};
use crate::source::RemoteSource;
use crate::storage::traits::SnapshotStore;

/// Progress label of the primary fetch.
pub const PHASE_FETCH_USERS: &str = "fetch_users";
/// Progress label of the secondary fetch.
pub const PHASE_FETCH_TRANSACTIONS: &str = "fetch_transactions";
/// Progress label of the write.
pub const PHASE_PERSIST: &str = "persist";
/// Progress label of the run as a whole.
pub const PHASE_RUN: &str = "run";

/// Sequences the fetches and the write of one synchronization run.
///
/// The orchestrator is `Send + Sync`; several runs may share one instance.
/// The retry policy is read-only and each run owns its snapshot until it is
/// handed to the store.
pub struct SyncOrchestrator {
    pub(super) source: Arc<dyn RemoteSource>,
    pub(super) store: Arc<dyn SnapshotStore>,
    pub(super) policy: RetryPolicy,
    pub(super) invoker: ResilientInvoker,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) fetch_mode: FetchMode,

    /// Run state (broadcast to watchers)
    pub(super) state: watch::Sender<RunState>,
    pub(super) state_rx: watch::Receiver<RunState>,

    pub(super) runs: AtomicU64,
    pub(super) succeeded: AtomicU64,
    pub(super) failed: AtomicU64,
    pub(super) recovered: AtomicU64,
}

impl SyncOrchestrator {
    /// Create an orchestrator with the system clock and sequential fetches.
    pub fn new(
        source: Arc<dyn RemoteSource>,
        store: Arc<dyn SnapshotStore>,
        policy: RetryPolicy,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(RunState::Idle);
        Self {
            source,
            store,
            policy,
            invoker: ResilientInvoker::default(),
            clock: Arc::new(SystemClock),
            fetch_mode: FetchMode::Sequential,
            state: state_tx,
            state_rx,
            runs: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            recovered: AtomicU64::new(0),
        }
    }

    /// Create an orchestrator from validated configuration.
    pub fn from_config(
        config: &SyncConfig,
        source: Arc<dyn RemoteSource>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self, SyncError> {
        let policy = config.retry_policy()?;
        let invoker = ResilientInvoker::new(ProgressReporter::new())
            .with_cancel_on_timeout(config.cancel_on_timeout);
        Ok(Self::new(source, store, policy)
            .with_invoker(invoker)
            .with_fetch_mode(config.fetch_mode))
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_fetch_mode(mut self, mode: FetchMode) -> Self {
        self.fetch_mode = mode;
        self
    }

    /// Replace the invoker (and with it the progress channel).
    #[must_use]
    pub fn with_invoker(mut self, invoker: ResilientInvoker) -> Self {
        self.invoker = invoker;
        self
    }

    /// Get current run state.
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<RunState> {
        self.state_rx.clone()
    }

    /// The progress stream shared by every run of this orchestrator.
    #[must_use]
    pub fn progress(&self) -> &ProgressReporter {
        self.invoker.progress()
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[must_use]
    pub fn fetch_mode(&self) -> FetchMode {
        self.fetch_mode
    }

    /// Late call results dropped so far.
    #[must_use]
    pub fn late_responses_suppressed(&self) -> u64 {
        self.invoker.late_responses_suppressed()
    }

    #[must_use]
    pub fn stats(&self) -> RunStats {
        RunStats {
            runs: self.runs.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            recovered: self.recovered.load(Ordering::Relaxed),
        }
    }

    pub(super) fn set_state(&self, state: RunState) {
        // send_replace never fails, even with no receivers.
        self.state.send_replace(state);
    }
}
