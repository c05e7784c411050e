// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The merged, all-or-nothing unit persisted by each successful run.
//!
//! A [`Snapshot`] can only be built with both record lists in hand, so a
//! half-fetched snapshot is unrepresentable. Once built it is immutable.
//!
//! # Document layout
//!
//! ```json
//! {
//!   "timestamp": 1718000000000,
//!   "users": [{ "id": 1, "name": "Ana", "role": "admin" }],
//!   "transactions": [{ "id": 101, "userId": 1, "amount": 50.0 }]
//! }
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::records::{TransactionRecord, UserRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Milliseconds since the Unix epoch at assembly time.
    timestamp: i64,
    users: Vec<UserRecord>,
    transactions: Vec<TransactionRecord>,
}

impl Snapshot {
    #[must_use]
    pub fn new(timestamp: i64, users: Vec<UserRecord>, transactions: Vec<TransactionRecord>) -> Self {
        Self { timestamp, users, transactions }
    }

    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    #[must_use]
    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }

    #[must_use]
    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    /// Encode as the persisted document: pretty JSON, two-space indent.
    ///
    /// Encoding is deterministic, so the same snapshot always yields the
    /// same bytes. Records that would not decode back (non-finite amounts,
    /// extra attributes shadowing typed fields) are rejected instead of
    /// written.
    pub fn to_document(&self) -> Result<Vec<u8>, serde_json::Error> {
        self.check_encodable()
            .map_err(<serde_json::Error as serde::ser::Error>::custom)?;
        serde_json::to_vec_pretty(self)
    }

    fn check_encodable(&self) -> Result<(), String> {
        self.users.iter().try_for_each(UserRecord::check_encodable)?;
        self.transactions.iter().try_for_each(TransactionRecord::check_encodable)
    }

    pub fn from_document(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Hex SHA-256 of the encoded document.
    pub fn checksum(&self) -> Result<String, serde_json::Error> {
        Ok(document_checksum(&self.to_document()?))
    }
}

/// Hex SHA-256 of an already encoded document.
#[must_use]
pub fn document_checksum(document: &[u8]) -> String {
    hex::encode(Sha256::digest(document))
}
