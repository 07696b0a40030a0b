//! Command gateway: turns add/delete intents into store mutations.
//!
//! The gateway holds no ledger state. After a successful write the new
//! collection arrives through the sync engine's live query, not from here.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    AddError, AddTransactionCmd, RemoveError, StoreError, TransactionId,
    store::TransactionStore, util::validate_add,
};

/// Marks an `add` as in flight; the flag is cleared on drop, whatever path
/// the submission leaves through.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct CommandGateway<S> {
    store: Arc<S>,
    in_flight: Arc<AtomicBool>,
}

impl<S> Clone for CommandGateway<S> {
    /// Clones share the in-flight flag: they are the same gateway.
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<S> std::fmt::Debug for CommandGateway<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandGateway")
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish()
    }
}

impl<S: TransactionStore> CommandGateway<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `true` while an `add` is waiting on the store.
    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Validate `cmd` and insert it.
    ///
    /// Single-flight: while a previous `add` on this gateway is pending,
    /// further calls fail with [`AddError::AlreadyInFlight`] without touching
    /// the store. A failed insert is not retried.
    pub async fn add(&self, cmd: AddTransactionCmd) -> Result<TransactionId, AddError> {
        let _in_flight = InFlight::acquire(&self.in_flight).ok_or(AddError::AlreadyInFlight)?;

        let record = validate_add(cmd)?;
        let owner = record.owner_id.clone();
        let kind = record.kind;

        match self.store.insert(record).await {
            Ok(id) => {
                tracing::info!(%owner, %kind, %id, "transaction added");
                Ok(id)
            }
            Err(err) => {
                tracing::error!(%owner, %kind, error = %err, "failed to add transaction");
                Err(AddError::StoreWriteFailed(err.to_string()))
            }
        }
    }

    /// Delete one transaction.
    ///
    /// An id that is already gone reports [`RemoveError::NotFound`]; that is
    /// the normal outcome of a list/delete race and is only logged.
    pub async fn remove(&self, id: &TransactionId) -> Result<(), RemoveError> {
        match self.store.delete_by_id(id).await {
            Ok(()) => {
                tracing::info!(%id, "transaction removed");
                Ok(())
            }
            Err(StoreError::NotFound) => {
                tracing::info!(%id, "transaction already gone");
                Err(RemoveError::NotFound)
            }
            Err(err) => {
                tracing::error!(%id, error = %err, "failed to remove transaction");
                Err(RemoveError::StoreWriteFailed(err.to_string()))
            }
        }
    }
}
