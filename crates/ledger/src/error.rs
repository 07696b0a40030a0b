//! The module contains the errors the ledger can report.
//!
//! Store collaborators speak [`StoreError`]. Nothing above the engine and the
//! gateway ever sees it: the gateway converts it into [`AddError`] or
//! [`RemoveError`], the engine into a [`SyncFailure`] published on its view.
//!
//! - [`ValidationError`] local, raised before any store call.
//! - [`AddError`] / [`RemoveError`] per-command outcomes.
//! - [`SyncFailure`] the observable "sync failed" state of a subscription.
//! - [`AuthError`] identity provider failures.
use thiserror::Error;

/// Errors a store collaborator can return.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected the request: {0}")]
    Rejected(String),
    #[error("subscription error: {0}")]
    Subscription(String),
}

/// Input rejected before reaching the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing owner: user is not signed in")]
    MissingOwner,
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("category must not be empty")]
    EmptyCategory,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("invalid transaction kind: {0}")]
    InvalidKind(String),
}

/// Outcome of a failed [`CommandGateway::add`](crate::CommandGateway::add).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("another submission is still in flight")]
    AlreadyInFlight,
    #[error("failed to save transaction: {0}")]
    StoreWriteFailed(String),
}

/// Outcome of a failed [`CommandGateway::remove`](crate::CommandGateway::remove).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoveError {
    #[error("transaction not found")]
    NotFound,
    #[error("failed to delete transaction: {0}")]
    StoreWriteFailed(String),
}

impl RemoveError {
    /// `NotFound` means the entry is already gone: a list/delete race, not a
    /// failure worth showing to the user.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Why a live subscription stopped delivering snapshots.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncFailure {
    #[error("subscription could not be established: {0}")]
    Refused(String),
    #[error("subscription interrupted: {0}")]
    Interrupted(String),
    #[error("subscription closed by the store")]
    Closed,
}

/// Identity provider failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}
