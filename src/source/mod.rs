// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The unreliable remote source the orchestrator pulls from.
//!
//! Calls may fail or never return; the orchestrator never trusts a source
//! to bound its own latency.

pub mod simulated;

use async_trait::async_trait;
use thiserror::Error;

use crate::records::{TransactionRecord, UserRecord};

pub use simulated::{SimulatedSource, SimulatedSourceConfig};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The remote end reported an error or could not be reached.
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch the primary dataset (users).
    async fn fetch_primary(&self) -> Result<Vec<UserRecord>, SourceError>;

    /// Fetch the secondary dataset (transactions).
    async fn fetch_secondary(&self) -> Result<Vec<TransactionRecord>, SourceError>;
}
