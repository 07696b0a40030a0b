//! Command structs for gateway operations.
//!
//! These types carry raw user input into the gateway, which validates them;
//! nothing here is trusted yet.

use crate::{TransactionKind, UserId};

/// Record a new expense or investment.
#[derive(Clone, Debug)]
pub struct AddTransactionCmd {
    pub owner_id: Option<UserId>,
    pub kind: TransactionKind,
    pub title: String,
    /// Amount exactly as typed, e.g. `"4.50"` or `"4,5"`.
    pub amount: String,
    pub category: String,
}

impl AddTransactionCmd {
    #[must_use]
    pub fn new(
        owner_id: impl Into<UserId>,
        kind: TransactionKind,
        title: impl Into<String>,
        amount: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            kind,
            title: title.into(),
            amount: amount.into(),
            category: category.into(),
        }
    }

    /// Same command issued while nobody is signed in.
    #[must_use]
    pub fn anonymous(
        kind: TransactionKind,
        title: impl Into<String>,
        amount: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: None,
            kind,
            title: title.into(),
            amount: amount.into(),
            category: category.into(),
        }
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = amount.into();
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}
