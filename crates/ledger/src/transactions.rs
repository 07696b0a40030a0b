//! Transaction primitives.
//!
//! A `Transaction` is a single expense or investment entry owned by one user.
//! It is created by the store on insert and never mutated afterwards.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MoneyCents, ValidationError};

/// Opaque identifier of a signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Store-assigned identifier of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TransactionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Expense,
    Investment,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 2] = [Self::Expense, Self::Investment];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Investment => "investment",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "expense" => Ok(Self::Expense),
            "investment" => Ok(Self::Investment),
            other => Err(ValidationError::InvalidKind(other.to_string())),
        }
    }
}

/// A stored ledger entry, as delivered by the store in a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub owner_id: UserId,
    pub kind: TransactionKind,
    pub title: String,
    pub amount: MoneyCents,
    pub category: String,
    /// Assigned by the store's clock, never by the client.
    pub created_at: DateTime<Utc>,
}

/// The record the gateway hands to the store. `id` and `created_at` are
/// missing on purpose: the store assigns both.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub owner_id: UserId,
    pub kind: TransactionKind,
    pub title: String,
    pub amount: MoneyCents,
    pub category: String,
}

impl NewTransaction {
    /// Materialize the record once the store has assigned its identity.
    pub fn into_transaction(self, id: TransactionId, created_at: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            owner_id: self.owner_id,
            kind: self.kind,
            title: self.title,
            amount: self.amount,
            category: self.category,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in TransactionKind::ALL {
            assert_eq!(TransactionKind::try_from(kind.as_str()), Ok(kind));
        }
        assert_eq!(
            TransactionKind::try_from(" Investment "),
            Ok(TransactionKind::Investment)
        );
        assert!(TransactionKind::try_from("income").is_err());
    }
}
