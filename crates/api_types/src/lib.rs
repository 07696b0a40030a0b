//! Wire types of the ledger store's HTTP API.
//!
//! Amounts travel as integer minor units (`amount_minor`, cents) and
//! timestamps as RFC3339 UTC strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod auth {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoginRequest {
        pub email: String,
        pub password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoginResponse {
        pub user_id: String,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionKind {
        Expense,
        Investment,
    }

    /// A stored transaction as returned by the store.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TransactionRecord {
        pub id: String,
        pub owner_id: String,
        pub kind: TransactionKind,
        pub title: String,
        /// Strictly positive, in cents.
        pub amount_minor: i64,
        pub category: String,
        /// Server-assigned creation time.
        pub created_at: DateTime<Utc>,
    }

    /// Request body for `POST transactions`.
    ///
    /// There is no `created_at`: the server stamps it.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionInsert {
        pub owner_id: String,
        pub kind: TransactionKind,
        pub title: String,
        pub amount_minor: i64,
        pub category: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InsertResponse {
        pub id: String,
    }

    /// Response body for `GET transactions?owner_id=...`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionSnapshot {
        /// Changes whenever the owner's result set changes.
        pub revision: u64,
        /// Newest first.
        #[serde(default)]
        pub transactions: Vec<TransactionRecord>,
    }
}

/// Error body returned by the store for non-2xx responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
