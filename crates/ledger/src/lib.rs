//! Real-time transaction ledger.
//!
//! Two components sit on top of a remote document store:
//!
//! - [`LedgerSync`] keeps one live query open on the signed-in user's
//!   transactions and derives the ordered collection and per-kind totals
//!   from every snapshot the store pushes.
//! - [`CommandGateway`] validates add/delete intents and writes them to the
//!   store. Its writes come back through the live query; it never patches
//!   local state.
//!
//! The store and the identity provider are collaborators behind the
//! [`TransactionStore`] and [`IdentityProvider`] traits. [`MemoryStore`] and
//! [`MemoryIdentity`] implement them in-process.

pub use commands::AddTransactionCmd;
pub use error::{AddError, AuthError, RemoveError, StoreError, SyncFailure, ValidationError};
pub use gateway::CommandGateway;
pub use identity::{Credentials, IdentityProvider, IdentityState, MemoryIdentity};
pub use memory::MemoryStore;
pub use money::MoneyCents;
pub use store::{Snapshot, SnapshotSink, SnapshotStream, TransactionStore, snapshot_channel};
pub use sync::{LedgerSync, LedgerView, SubscriptionHandle, SyncStatus, Totals};
pub use transactions::{NewTransaction, Transaction, TransactionId, TransactionKind, UserId};

pub mod categories;
mod commands;
mod error;
mod gateway;
pub mod identity;
pub mod memory;
mod money;
pub mod store;
mod sync;
mod transactions;
mod util;

type ResultValidation<T> = Result<T, ValidationError>;
