//! One synchronization run: fetch, fetch, assemble, persist.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::error::SyncError;
use crate::progress::Outcome;
use crate::records::{TransactionRecord, UserRecord};
use crate::snapshot::Snapshot;
use crate::storage::traits::StorageError;

use super::{
    FetchMode, RunState, SyncOrchestrator, PHASE_FETCH_TRANSACTIONS, PHASE_FETCH_USERS,
    PHASE_PERSIST, PHASE_RUN,
};

impl SyncOrchestrator {
    /// Run one synchronization.
    ///
    /// Flow (sequential mode):
    /// 1. Fetch users with retry; on exhaustion abort, skipping everything below
    /// 2. Fetch transactions with retry; on exhaustion abort
    /// 3. Assemble the snapshot, stamped with the clock's current time
    /// 4. Persist it; a write failure returns the snapshot inside
    ///    [`SyncError::PersistenceFailed`]
    ///
    /// Either the snapshot is persisted and returned, or nothing is written.
    #[tracing::instrument(skip(self), fields(mode = %self.fetch_mode))]
    pub async fn run(&self) -> Result<Snapshot, SyncError> {
        let start = Instant::now();
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.progress().phase(PHASE_RUN, Outcome::Started, format!("{} fetch", self.fetch_mode));

        let result = self.run_steps().await;

        match &result {
            Ok(snapshot) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                self.set_state(RunState::Completed);
                self.progress().phase(
                    PHASE_RUN,
                    Outcome::Success,
                    format!(
                        "{} users, {} transactions",
                        snapshot.users().len(),
                        snapshot.transactions().len()
                    ),
                );
                crate::metrics::record_run("success", start.elapsed());
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.set_state(RunState::Failed);
                self.progress().phase(PHASE_RUN, Outcome::Aborted, e.to_string());
                let status = if e.is_fetch_failure() { "fetch_failed" } else { "persist_failed" };
                crate::metrics::record_run(status, start.elapsed());
            }
        }
        result
    }

    async fn run_steps(&self) -> Result<Snapshot, SyncError> {
        let (users, transactions) = match self.fetch_mode {
            FetchMode::Sequential => {
                self.set_state(RunState::FetchingPrimary);
                let users = self.fetch_users().await?;
                self.set_state(RunState::FetchingSecondary);
                let transactions = self.fetch_transactions().await?;
                (users, transactions)
            }
            FetchMode::Concurrent => {
                self.set_state(RunState::FetchingBoth);
                tokio::try_join!(self.fetch_users(), self.fetch_transactions())?
            }
        };

        let snapshot = Snapshot::new(self.clock.now_millis(), users, transactions);

        if let Err(source) = self.write_snapshot(&snapshot).await {
            return Err(SyncError::PersistenceFailed {
                snapshot: Box::new(snapshot),
                source,
            });
        }
        Ok(snapshot)
    }

    async fn fetch_users(&self) -> Result<Vec<UserRecord>, SyncError> {
        let source = Arc::clone(&self.source);
        let users = self
            .invoker
            .execute(PHASE_FETCH_USERS, &self.policy, move || {
                let source = Arc::clone(&source);
                async move { source.fetch_primary().await }
            })
            .await?;

        self.progress().phase(
            PHASE_FETCH_USERS,
            Outcome::Success,
            format!("{} users received", users.len()),
        );
        Ok(users)
    }

    async fn fetch_transactions(&self) -> Result<Vec<TransactionRecord>, SyncError> {
        let source = Arc::clone(&self.source);
        let transactions = self
            .invoker
            .execute(PHASE_FETCH_TRANSACTIONS, &self.policy, move || {
                let source = Arc::clone(&source);
                async move { source.fetch_secondary().await }
            })
            .await?;

        self.progress().phase(
            PHASE_FETCH_TRANSACTIONS,
            Outcome::Success,
            format!("{} transactions received", transactions.len()),
        );
        Ok(transactions)
    }

    /// Write `snapshot` to the store once, without retry.
    ///
    /// For callers re-attempting the write of a snapshot recovered from
    /// [`SyncError::PersistenceFailed`]. A success counts in
    /// [`super::RunStats::recovered`]; the failed run stays counted as failed.
    pub async fn persist(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let result = self.write_snapshot(snapshot).await;
        if result.is_ok() {
            self.recovered.fetch_add(1, Ordering::Relaxed);
            self.set_state(RunState::Completed);
        } else {
            self.set_state(RunState::Failed);
        }
        result
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        self.set_state(RunState::Persisting);
        match self.store.persist(snapshot).await {
            Ok(()) => {
                info!(store = self.store.kind(), timestamp = snapshot.timestamp(), "Snapshot saved");
                self.progress().phase(PHASE_PERSIST, Outcome::Success, "snapshot saved");
                Ok(())
            }
            Err(e) => {
                warn!(store = self.store.kind(), error = %e, "Snapshot not saved");
                self.progress().phase(PHASE_PERSIST, Outcome::Failure, e.to_string());
                Err(e)
            }
        }
    }
}
