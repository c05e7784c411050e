// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for resilient-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `resilient_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//! - `_bytes` suffix for size histograms
//!
//! # Labels
//! - `operation`: the resilient call label (`fetch_users`, `fetch_transactions`, ...)
//! - `outcome`: success, timeout, failure
//! - `status`: success, fetch_failed, persist_failed
//! - `store`: file, sql, memory

use metrics::{counter, histogram};
use std::time::{Duration, Instant};

/// Record the outcome of one attempt
pub fn record_attempt(operation: &str, outcome: &str) {
    counter!(
        "resilient_sync_attempts_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record how long one attempt took to settle (success, failure or timeout)
pub fn record_attempt_latency(operation: &str, duration: Duration) {
    histogram!(
        "resilient_sync_attempt_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a call result that arrived after its timeout had already fired
pub fn record_late_response(operation: &str) {
    counter!(
        "resilient_sync_late_responses_suppressed_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a resilient call that gave up
pub fn record_retries_exhausted(operation: &str) {
    counter!(
        "resilient_sync_retries_exhausted_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record the end of a whole run
pub fn record_run(status: &str, duration: Duration) {
    counter!(
        "resilient_sync_runs_total",
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "resilient_sync_run_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a persisted document
pub fn record_persist(store: &str, bytes: usize, duration: Duration) {
    counter!(
        "resilient_sync_persist_total",
        "store" => store.to_string(),
        "status" => "success"
    )
    .increment(1);
    histogram!(
        "resilient_sync_document_bytes",
        "store" => store.to_string()
    )
    .record(bytes as f64);
    histogram!(
        "resilient_sync_persist_seconds",
        "store" => store.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a failed write
pub fn record_persist_error(store: &str) {
    counter!(
        "resilient_sync_persist_total",
        "store" => store.to_string(),
        "status" => "error"
    )
    .increment(1);
}

/// A timer guard that records attempt latency when dropped
pub struct LatencyTimer {
    operation: String,
    start: Instant,
}

impl LatencyTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_attempt_latency(&self.operation, self.start.elapsed());
    }
}
