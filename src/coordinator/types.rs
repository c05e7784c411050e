//! Public types for the sync orchestrator.

use serde::Deserialize;

/// Where the orchestrator is within a run.
///
/// Use [`super::SyncOrchestrator::state()`] to check the current state or
/// [`super::SyncOrchestrator::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run started yet
    Idle,
    /// Fetching the primary dataset (users)
    FetchingPrimary,
    /// Fetching the secondary dataset (transactions)
    FetchingSecondary,
    /// Fetching both datasets at once (concurrent mode)
    FetchingBoth,
    /// Writing the merged snapshot
    Persisting,
    /// Last run persisted its snapshot
    Completed,
    /// Last run aborted
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::FetchingPrimary => write!(f, "FetchingPrimary"),
            Self::FetchingSecondary => write!(f, "FetchingSecondary"),
            Self::FetchingBoth => write!(f, "FetchingBoth"),
            Self::Persisting => write!(f, "Persisting"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// How the two datasets are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Primary, then secondary once the primary has succeeded
    #[default]
    Sequential,
    /// Both at once; the first exhausted fetch aborts the run
    Concurrent,
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Concurrent => write!(f, "concurrent"),
        }
    }
}

/// Run counters since the orchestrator was created.
///
/// `runs`, `succeeded` and `failed` count [`super::SyncOrchestrator::run`]
/// calls only. A failed run whose snapshot is later written through
/// [`super::SyncOrchestrator::persist`] stays counted as failed and adds
/// one to `recovered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    pub runs: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Successful writes through `persist()`
    pub recovered: u64,
}

impl RunStats {
    /// Runs still in flight.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.runs.saturating_sub(self.succeeded + self.failed)
    }
}
