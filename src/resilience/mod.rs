// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry policy and the timed, retried invoker.

pub mod retry;
pub mod invoker;

pub use retry::{AttemptOutcome, Backoff, RetryPolicy};
pub use invoker::{RaceGate, ResilientInvoker};
