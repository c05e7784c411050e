// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Timed, retried execution of a single remote call.
//!
//! Each attempt races the call against a timer. The call runs on its own
//! task and reports through a one-shot channel guarded by a [`RaceGate`]:
//! whichever branch settles the gate first decides the attempt. A call that
//! finishes after the timer has settled the gate finds it closed and drops
//! its result, so a late response can never reach the caller even when the
//! abandoned task is not cancelled.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use super::retry::{AttemptOutcome, RetryPolicy};
use crate::error::{AttemptFailure, SyncError};
use crate::metrics::{self, LatencyTimer};
use crate::progress::{Outcome, ProgressReporter};

/// Single-resolution gate shared by the two sides of one race.
#[derive(Debug, Clone, Default)]
pub struct RaceGate {
    decided: Arc<AtomicBool>,
}

impl RaceGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to decide the race. Returns true for exactly one caller.
    pub fn settle(&self) -> bool {
        self.decided
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[must_use]
    pub fn is_decided(&self) -> bool {
        self.decided.load(Ordering::Acquire)
    }
}

/// Handle to the task running one attempt's call.
///
/// Aborts the task when dropped while armed, so a race future dropped
/// mid-call (a sibling failing under `try_join!`, a caller-side timeout)
/// does not leave the call running.
struct CallTask {
    handle: JoinHandle<()>,
    abort_on_drop: bool,
}

impl CallTask {
    /// Let the task run to completion on its own.
    fn detach(mut self) {
        self.abort_on_drop = false;
    }
}

impl Drop for CallTask {
    fn drop(&mut self) {
        if self.abort_on_drop {
            self.handle.abort();
        }
    }
}

/// Wraps remote calls with a per-attempt timeout and bounded retries.
#[derive(Debug, Clone)]
pub struct ResilientInvoker {
    progress: ProgressReporter,
    cancel_on_timeout: bool,
    late_responses: Arc<AtomicU64>,
}

impl Default for ResilientInvoker {
    fn default() -> Self {
        Self::new(ProgressReporter::new())
    }
}

impl ResilientInvoker {
    #[must_use]
    pub fn new(progress: ProgressReporter) -> Self {
        Self {
            progress,
            cancel_on_timeout: true,
            late_responses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether to abort the call task when its timer wins or the attempt
    /// itself is dropped mid-call.
    ///
    /// Only frees resources earlier; suppression holds either way.
    #[must_use]
    pub fn with_cancel_on_timeout(mut self, cancel: bool) -> Self {
        self.cancel_on_timeout = cancel;
        self
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    /// Number of call results dropped because their timer had already fired.
    #[must_use]
    pub fn late_responses_suppressed(&self) -> u64 {
        self.late_responses.load(Ordering::Relaxed)
    }

    /// Run `call` until it succeeds or `policy.max_attempts()` attempts have failed.
    ///
    /// Attempts are strictly sequential. Timeouts and call errors are both
    /// retried after the policy's backoff; only exhaustion escapes, as
    /// [`SyncError::RetriesExhausted`] carrying the last reason.
    pub async fn execute<F, Fut, T, E>(
        &self,
        operation: &str,
        policy: &RetryPolicy,
        mut call: F,
    ) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let max_attempts = policy.max_attempts();
        let mut attempt: u32 = 1;

        loop {
            let outcome = self
                .race_attempt(operation, attempt, policy.per_attempt_timeout(), call())
                .await;

            let reason = match outcome.into_result() {
                Ok(value) => {
                    metrics::record_attempt(operation, "success");
                    self.progress.attempt(operation, attempt, Outcome::Success, "payload received");
                    return Ok(value);
                }
                Err(reason) => reason,
            };

            metrics::record_attempt(operation, reason.kind());
            let progress_outcome = match reason {
                AttemptFailure::Timeout { .. } => Outcome::Timeout,
                AttemptFailure::Transient(_) => Outcome::Failure,
            };

            if attempt >= max_attempts {
                self.progress.attempt(
                    operation,
                    attempt,
                    progress_outcome,
                    format!("{} (no attempts left)", reason),
                );
                metrics::record_retries_exhausted(operation);
                return Err(SyncError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last_reason: reason,
                });
            }

            let delay = policy.delay_after(attempt);
            self.progress.attempt(
                operation,
                attempt,
                progress_outcome,
                format!("{}; retrying in {:?} ({}/{})", reason, delay, attempt, max_attempts),
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// Race one call against a timer of `timeout`.
    async fn race_attempt<Fut, T, E>(
        &self,
        operation: &str,
        attempt: u32,
        timeout: Duration,
        call: Fut,
    ) -> AttemptOutcome<T>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let _timer = LatencyTimer::new(operation);
        let gate = RaceGate::new();
        let (tx, mut rx) = oneshot::channel::<Result<T, String>>();

        let call_gate = gate.clone();
        let late_responses = Arc::clone(&self.late_responses);
        let op = operation.to_string();
        let handle = tokio::spawn(async move {
            let result = call.await;
            if call_gate.settle() {
                // Err only if the caller itself went away.
                let _ = tx.send(result.map_err(|e| e.to_string()));
            } else {
                late_responses.fetch_add(1, Ordering::Relaxed);
                metrics::record_late_response(&op);
                debug!(operation = %op, attempt, "Late response suppressed");
            }
        });
        let task = CallTask { handle, abort_on_drop: self.cancel_on_timeout };

        let raced = tokio::select! {
            received = &mut rx => Some(received),
            _ = sleep(timeout) => None,
        };

        let received = match raced {
            Some(received) => received,
            None => {
                if gate.settle() {
                    if !self.cancel_on_timeout {
                        task.detach();
                    }
                    return AttemptOutcome::Timeout(timeout);
                }
                // The call settled the gate at the same instant the timer
                // fired; its result is already on its way.
                rx.await
            }
        };

        match received {
            Ok(Ok(value)) => AttemptOutcome::Success(value),
            Ok(Err(reason)) => AttemptOutcome::Failure(reason),
            Err(_) => AttemptOutcome::Failure("call task ended without a result".to_string()),
        }
    }
}
