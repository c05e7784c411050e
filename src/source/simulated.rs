// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! An unstable in-process API for demos and soak tests.
//!
//! Every call sleeps for a random latency and fails with a configurable
//! probability. Successful calls return a small fixed dataset.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::sleep;
use tracing::debug;

use super::{RemoteSource, SourceError};
use crate::records::{TransactionRecord, UserRecord};

#[derive(Debug, Clone)]
pub struct SimulatedSourceConfig {
    /// Lower bound of per-call latency
    pub min_latency: Duration,
    /// Upper bound of per-call latency (inclusive)
    pub max_latency: Duration,
    /// Probability in `[0, 1]` that a call fails
    pub failure_probability: f64,
}

impl Default for SimulatedSourceConfig {
    fn default() -> Self {
        Self {
            min_latency: Duration::from_millis(500),
            max_latency: Duration::from_millis(1500),
            failure_probability: 0.3,
        }
    }
}

pub struct SimulatedSource {
    config: SimulatedSourceConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedSource {
    #[must_use]
    pub fn new(config: SimulatedSourceConfig) -> Self {
        Self { config, rng: Mutex::new(StdRng::from_entropy()) }
    }

    /// Reproducible latency and failure sequence.
    #[must_use]
    pub fn with_seed(config: SimulatedSourceConfig, seed: u64) -> Self {
        Self { config, rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    /// Roll latency and failure for one call.
    fn roll(&self) -> (Duration, bool) {
        let mut rng = self.rng.lock();
        let min = self.config.min_latency.as_millis() as u64;
        let max = (self.config.max_latency.as_millis() as u64).max(min);
        let latency = Duration::from_millis(rng.gen_range(min..=max));
        // NaN would panic in gen_bool; treat it as "never fail".
        let p = if self.config.failure_probability.is_nan() {
            0.0
        } else {
            self.config.failure_probability.clamp(0.0, 1.0)
        };
        (latency, rng.gen_bool(p))
    }

    fn users() -> Vec<UserRecord> {
        vec![
            UserRecord::new(1, "Ana").with_attr("role", "admin"),
            UserRecord::new(2, "Carlos").with_attr("role", "user"),
        ]
    }

    fn transactions() -> Vec<TransactionRecord> {
        vec![TransactionRecord::new(101, 1, 50.0), TransactionRecord::new(102, 2, 120.0)]
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(SimulatedSourceConfig::default())
    }
}

#[async_trait]
impl RemoteSource for SimulatedSource {
    async fn fetch_primary(&self) -> Result<Vec<UserRecord>, SourceError> {
        let (latency, fail) = self.roll();
        debug!(?latency, fail, "Simulated user fetch");
        sleep(latency).await;
        if fail {
            return Err(SourceError::Unavailable("HTTP 500: user service error".into()));
        }
        Ok(Self::users())
    }

    async fn fetch_secondary(&self) -> Result<Vec<TransactionRecord>, SourceError> {
        let (latency, fail) = self.roll();
        debug!(?latency, fail, "Simulated transaction fetch");
        sleep(latency).await;
        if fail {
            return Err(SourceError::Unavailable("HTTP 503: payment service unavailable".into()));
        }
        Ok(Self::transactions())
    }
}
