// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Progress reporting for operators.
//!
//! Every event is logged through `tracing` and also published on a
//! broadcast channel so a console or log shipper can follow a run. The
//! channel is purely observational: a slow or missing subscriber never
//! blocks or fails a run.

use tokio::sync::broadcast;
use tracing::{info, warn};

/// Buffered events per subscriber before it starts lagging.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// How an event's step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Started,
    Success,
    Timeout,
    Failure,
    Aborted,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Success => write!(f, "success"),
            Self::Timeout => write!(f, "timeout"),
            Self::Failure => write!(f, "failure"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// One entry on the progress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Step label, e.g. `fetch_users` or `persist`.
    pub phase: String,
    /// Attempt number (1-based) for retried steps.
    pub attempt: Option<u32>,
    pub outcome: Outcome,
    /// Human-readable detail.
    pub detail: String,
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.attempt {
            Some(n) => write!(f, "[{}] attempt {}: {} ({})", self.phase, n, self.outcome, self.detail),
            None => write!(f, "[{}] {} ({})", self.phase, self.outcome, self.detail),
        }
    }
}

/// Logs progress and fans it out to subscribers.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: broadcast::Sender<ProgressEvent>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Follow events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Report the end of one attempt of a retried step.
    pub fn attempt(&self, phase: &str, attempt: u32, outcome: Outcome, detail: impl Into<String>) {
        let detail = detail.into();
        match outcome {
            Outcome::Success | Outcome::Started => {
                info!(phase, attempt, %outcome, detail = %detail, "Attempt finished");
            }
            _ => {
                warn!(phase, attempt, %outcome, detail = %detail, "Attempt failed");
            }
        }
        self.publish(ProgressEvent { phase: phase.to_string(), attempt: Some(attempt), outcome, detail });
    }

    /// Report a step-level transition (no attempt number).
    pub fn phase(&self, phase: &str, outcome: Outcome, detail: impl Into<String>) {
        let detail = detail.into();
        match outcome {
            Outcome::Failure | Outcome::Aborted | Outcome::Timeout => {
                warn!(phase, %outcome, detail = %detail, "Sync step failed");
            }
            _ => {
                info!(phase, %outcome, detail = %detail, "Sync step");
            }
        }
        self.publish(ProgressEvent { phase: phase.to_string(), attempt: None, outcome, detail });
    }

    fn publish(&self, event: ProgressEvent) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }
}
