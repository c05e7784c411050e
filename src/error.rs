// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error taxonomy for synchronization runs.
//!
//! Retryable reasons ([`AttemptFailure`]) never escape the invoker on their
//! own: they only surface wrapped in [`SyncError::RetriesExhausted`] once the
//! retry budget is spent.

use std::time::Duration;
use thiserror::Error;

use crate::snapshot::Snapshot;
use crate::storage::traits::StorageError;

/// Why a single attempt did not produce a payload. Both variants are retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// The attempt exceeded its per-attempt timeout.
    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    /// The remote call returned an error.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl AttemptFailure {
    /// Short label used for log fields and metric labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Transient(_) => "failure",
        }
    }
}

/// Terminal error of a synchronization run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Every attempt of one resilient call failed.
    #[error("{operation}: retries exhausted after {attempts} attempt(s), last reason: {last_reason}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_reason: AttemptFailure,
    },

    /// Both fetches succeeded but the durable write did not.
    ///
    /// The snapshot is handed back so the caller can retry persistence alone
    /// via [`crate::SyncOrchestrator::persist`].
    #[error("snapshot persistence failed: {source}")]
    PersistenceFailed {
        snapshot: Box<Snapshot>,
        #[source]
        source: StorageError,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Recover the unpersisted snapshot, if this error carries one.
    #[must_use]
    pub fn into_unpersisted_snapshot(self) -> Option<Snapshot> {
        match self {
            Self::PersistenceFailed { snapshot, .. } => Some(*snapshot),
            _ => None,
        }
    }

    /// Whether the run failed during a fetch (nothing was persisted or built).
    #[must_use]
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_failure_display() {
        let t = AttemptFailure::Timeout { after: Duration::from_millis(2000) };
        assert_eq!(t.to_string(), "timed out after 2s");
        assert_eq!(t.kind(), "timeout");

        let f = AttemptFailure::Transient("HTTP 503".into());
        assert_eq!(f.to_string(), "transient failure: HTTP 503");
        assert_eq!(f.kind(), "failure");
    }

    #[test]
    fn test_retries_exhausted_message_names_operation_and_reason() {
        let err = SyncError::RetriesExhausted {
            operation: "fetch_users".into(),
            attempts: 3,
            last_reason: AttemptFailure::Transient("boom".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("fetch_users"));
        assert!(msg.contains("3 attempt(s)"));
        assert!(msg.contains("boom"));
        assert!(err.is_fetch_failure());
        assert!(err.into_unpersisted_snapshot().is_none());
    }

    #[test]
    fn test_persistence_failed_returns_snapshot() {
        let snapshot = Snapshot::new(42, vec![], vec![]);
        let err = SyncError::PersistenceFailed {
            snapshot: Box::new(snapshot.clone()),
            source: StorageError::Backend("disk full".into()),
        };
        assert!(!err.is_fetch_failure());
        assert!(err.to_string().contains("disk full"));
        assert_eq!(err.into_unpersisted_snapshot(), Some(snapshot));
    }
}
