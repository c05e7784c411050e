// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry policy: attempt budget, per-attempt timeout and backoff.
//!
//! The default backoff is a constant delay between attempts. An exponential
//! schedule is available but must be asked for explicitly.
//!
//! # Example
//!
//! ```
//! use resilient_sync::RetryPolicy;
//! use std::time::Duration;
//!
//! // One attempt plus three retries, 2s per attempt, 1s between attempts
//! let standard = RetryPolicy::standard();
//! assert_eq!(standard.max_attempts(), 4);
//! assert_eq!(standard.delay_after(1), Duration::from_secs(1));
//! assert_eq!(standard.delay_after(3), Duration::from_secs(1));
//!
//! // Single timed attempt, no retry
//! let once = RetryPolicy::single_attempt(Duration::from_millis(500));
//! assert_eq!(once.max_attempts(), 1);
//! ```

use std::time::Duration;

use crate::error::{AttemptFailure, SyncError};

/// Delay schedule between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `initial * factor^(n-1)`, capped at `max`.
    Exponential {
        initial: Duration,
        max: Duration,
        factor: f64,
    },
}

impl Backoff {
    /// Delay to wait after the given (1-based) failed attempt.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial, max, factor } => {
                let exponent = attempt.saturating_sub(1).min(32) as i32;
                let scaled = initial.as_secs_f64() * factor.powi(exponent);
                if !scaled.is_finite() || scaled >= max.as_secs_f64() {
                    *max
                } else {
                    Duration::from_secs_f64(scaled.max(0.0))
                }
            }
        }
    }
}

/// Immutable retry configuration shared by every resilient call of a run.
///
/// Read-only after construction, so one policy can be shared across
/// concurrent runs.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    per_attempt_timeout: Duration,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl RetryPolicy {
    /// Constant-delay policy. Fails if `max_attempts` is zero or the timeout is zero.
    pub fn new(
        max_attempts: u32,
        per_attempt_timeout: Duration,
        backoff_delay: Duration,
    ) -> Result<Self, SyncError> {
        Self::with_backoff(max_attempts, per_attempt_timeout, Backoff::Fixed(backoff_delay))
    }

    pub fn with_backoff(
        max_attempts: u32,
        per_attempt_timeout: Duration,
        backoff: Backoff,
    ) -> Result<Self, SyncError> {
        if max_attempts == 0 {
            return Err(SyncError::InvalidConfig("max_attempts must be at least 1".into()));
        }
        if per_attempt_timeout.is_zero() {
            return Err(SyncError::InvalidConfig("per_attempt_timeout must be non-zero".into()));
        }
        if let Backoff::Exponential { factor, .. } = &backoff {
            if !factor.is_finite() || *factor < 1.0 {
                return Err(SyncError::InvalidConfig(format!(
                    "backoff factor must be a finite value >= 1.0, got {}",
                    factor
                )));
            }
        }
        Ok(Self { max_attempts, per_attempt_timeout, backoff })
    }

    /// One attempt plus three retries: 2s per attempt, 1s fixed backoff.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            max_attempts: 4,
            per_attempt_timeout: Duration::from_secs(2),
            backoff: Backoff::Fixed(Duration::from_secs(1)),
        }
    }

    /// Fast-fail policy for connecting to a backend at startup.
    /// 5 attempts with exponential backoff, giving up after roughly a minute
    /// so configuration errors surface quickly.
    #[must_use]
    pub fn startup() -> Self {
        Self {
            max_attempts: 5,
            per_attempt_timeout: Duration::from_secs(10),
            backoff: Backoff::Exponential {
                initial: Duration::from_millis(200),
                max: Duration::from_secs(2),
                factor: 2.0,
            },
        }
    }

    /// A single timed attempt with no retry.
    #[must_use]
    pub fn single_attempt(per_attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            per_attempt_timeout,
            backoff: Backoff::Fixed(Duration::ZERO),
        }
    }

    /// Fast policy for tests (minimal delays)
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_attempts: 3,
            per_attempt_timeout: Duration::from_millis(50),
            backoff: Backoff::Fixed(Duration::from_millis(1)),
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn per_attempt_timeout(&self) -> Duration {
        self.per_attempt_timeout
    }

    #[must_use]
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Delay to wait after the given (1-based) failed attempt.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.delay_after(attempt)
    }

    /// Upper bound on the time one resilient call can take: each attempt's
    /// timeout plus the backoff that follows it.
    #[must_use]
    pub fn worst_case_duration(&self) -> Duration {
        (1..=self.max_attempts)
            .map(|n| self.per_attempt_timeout + self.delay_after(n))
            .sum()
    }
}

/// Result of racing one call against its timer.
///
/// Lives for a single iteration of the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome<T> {
    Success(T),
    Timeout(Duration),
    Failure(String),
}

impl<T> AttemptOutcome<T> {
    /// Split into the payload or the retryable reason.
    pub fn into_result(self) -> Result<T, AttemptFailure> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Timeout(after) => Err(AttemptFailure::Timeout { after }),
            Self::Failure(reason) => Err(AttemptFailure::Transient(reason)),
        }
    }
}
