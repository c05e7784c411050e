// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record types returned by the remote sources.
//!
//! Only the identifying fields are typed. Anything else the source sends
//! (e.g. a user's `role`) is kept in `extra` and written back out unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Document keys owned by [`UserRecord`]'s typed fields.
pub const USER_KEYS: [&str; 2] = ["id", "name"];
/// Document keys owned by [`TransactionRecord`]'s typed fields.
pub const TRANSACTION_KEYS: [&str; 3] = ["id", "userId", "amount"];

fn reserved_extra(extra: &Map<String, Value>, reserved: &[&str]) -> Option<String> {
    extra.keys().find(|k| reserved.contains(&k.as_str())).cloned()
}

/// A user as returned by the primary source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRecord {
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), extra: Map::new() }
    }

    /// Attach an extra attribute, builder style.
    ///
    /// `id` and `name` belong to the typed fields; such keys are ignored.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if USER_KEYS.contains(&key.as_str()) {
            warn!(user = self.id, key = %key, "Ignoring extra attribute that shadows a typed field");
            return self;
        }
        self.extra.insert(key, value.into());
        self
    }

    /// Whether this record encodes to a document that decodes back.
    pub fn check_encodable(&self) -> Result<(), String> {
        match reserved_extra(&self.extra, &USER_KEYS) {
            Some(key) => Err(format!("user {}: extra attribute `{}` shadows a typed field", self.id, key)),
            None => Ok(()),
        }
    }
}

/// A transaction as returned by the secondary source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: u64,
    #[serde(rename = "userId")]
    pub user_id: u64,
    pub amount: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TransactionRecord {
    #[must_use]
    pub fn new(id: u64, user_id: u64, amount: f64) -> Self {
        Self { id, user_id, amount, extra: Map::new() }
    }

    /// Whether this record encodes to a document that decodes back.
    ///
    /// JSON has no NaN or infinity, so a non-finite amount would be written
    /// as `null`.
    pub fn check_encodable(&self) -> Result<(), String> {
        if !self.amount.is_finite() {
            return Err(format!("transaction {}: amount {} is not finite", self.id, self.amount));
        }
        match reserved_extra(&self.extra, &TRANSACTION_KEYS) {
            Some(key) => Err(format!("transaction {}: extra attribute `{}` shadows a typed field", self.id, key)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_extra_fields_survive_serialization() {
        let user = UserRecord::new(1, "Ana").with_attr("role", "admin");
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value, json!({"id": 1, "name": "Ana", "role": "admin"}));

        let back: UserRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn test_transaction_uses_camel_case_user_id() {
        let tx = TransactionRecord::new(101, 1, 50.0);
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["userId"], json!(1));
        assert!(value.get("user_id").is_none());
    }

    #[test]
    fn test_with_attr_ignores_typed_field_keys() {
        let user = UserRecord::new(1, "Ana").with_attr("name", "Dup").with_attr("id", 9);
        assert_eq!(user.name, "Ana");
        assert_eq!(user.id, 1);
        assert!(user.extra.is_empty());
        assert!(user.check_encodable().is_ok());
    }

    #[test]
    fn test_shadowing_extra_is_not_encodable() {
        let mut user = UserRecord::new(1, "Ana");
        user.extra.insert("name".into(), json!("Dup"));
        assert!(user.check_encodable().is_err());

        let mut tx = TransactionRecord::new(101, 1, 50.0);
        tx.extra.insert("userId".into(), json!(2));
        assert!(tx.check_encodable().is_err());
    }

    #[test]
    fn test_non_finite_amount_is_not_encodable() {
        assert!(TransactionRecord::new(1, 1, f64::NAN).check_encodable().is_err());
        assert!(TransactionRecord::new(1, 1, f64::INFINITY).check_encodable().is_err());
        assert!(TransactionRecord::new(1, 1, -0.5).check_encodable().is_ok());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let result: Result<TransactionRecord, _> =
            serde_json::from_value(json!({"id": 1, "amount": 3.5}));
        assert!(result.is_err());
    }
}
