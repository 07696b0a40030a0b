//! Ledger sync engine.
//!
//! Owns the live query on one user's transactions and publishes a
//! [`LedgerView`] (ordered collection, totals, sync status) on a
//! `tokio::sync::watch` channel.
//!
//! Every snapshot *replaces* the collection. Totals are recomputed from the
//! whole collection each time and never patched incrementally, so the view
//! cannot drift from what the store holds.
//!
//! Each subscription carries a generation number. Snapshots are applied
//! inside the watch channel's write lock and only while their generation is
//! still current; cancelling bumps the generation under that same lock, so
//! once [`SubscriptionHandle::cancel`] returns nothing else reaches the view.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::{sync::watch, task::AbortHandle};

use crate::{
    IdentityState, MoneyCents, SyncFailure, Transaction, TransactionKind, UserId,
    store::{Snapshot, SnapshotStream, TransactionStore},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SyncStatus {
    /// No subscription.
    #[default]
    Idle,
    /// Subscribed, first snapshot not received yet.
    Connecting,
    /// At least one snapshot applied and the query is still open.
    Live,
    /// The query broke; the collection holds the last good snapshot.
    Failed(SyncFailure),
}

/// Sums of `amount` per kind over a whole collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    pub expenses: MoneyCents,
    pub investments: MoneyCents,
}

impl Totals {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let sum = |kind: TransactionKind| {
            transactions
                .iter()
                .filter(|t| t.kind == kind)
                .map(|t| t.amount)
                .sum::<MoneyCents>()
        };
        Self {
            expenses: sum(TransactionKind::Expense),
            investments: sum(TransactionKind::Investment),
        }
    }

    pub fn of(&self, kind: TransactionKind) -> MoneyCents {
        match kind {
            TransactionKind::Expense => self.expenses,
            TransactionKind::Investment => self.investments,
        }
    }
}

/// What observers of the engine see.
#[derive(Clone, Debug, Default)]
pub struct LedgerView {
    owner: Option<UserId>,
    transactions: Arc<Vec<Transaction>>,
    totals: Totals,
    status: SyncStatus,
    generation: u64,
}

impl LedgerView {
    pub fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    /// The current collection, newest first.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn failure(&self) -> Option<&SyncFailure> {
        match &self.status {
            SyncStatus::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Entries of `kind`, in collection order.
    pub fn filter_by_kind(&self, kind: TransactionKind) -> Vec<Transaction> {
        self.transactions
            .iter()
            .filter(|t| t.kind == kind)
            .cloned()
            .collect()
    }

    pub fn aggregate(&self, kind: TransactionKind) -> MoneyCents {
        self.totals.of(kind)
    }

    /// Full replace: the previous collection is discarded, not merged.
    fn replace(&mut self, mut snapshot: Snapshot) {
        // Stable: equal timestamps keep the store's order.
        snapshot.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.totals = Totals::from_transactions(&snapshot);
        self.transactions = Arc::new(snapshot);
        self.status = SyncStatus::Live;
    }
}

#[derive(Debug)]
struct Active {
    generation: u64,
    owner: UserId,
    task: AbortHandle,
}

/// State shared between the engine and its subscription handles.
#[derive(Debug)]
struct Shared {
    view: watch::Sender<LedgerView>,
    active: Mutex<Option<Active>>,
}

impl Shared {
    fn active(&self) -> MutexGuard<'_, Option<Active>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tear down subscription `generation` if it is still the current one.
    fn cancel(&self, generation: u64) -> bool {
        let mut active = self.active();
        let Some(current) = active.take_if(|a| a.generation == generation) else {
            return false;
        };
        self.reset_view();
        current.task.abort();
        tracing::info!(owner = %current.owner, generation, "subscription cancelled");
        true
    }

    fn reset_view(&self) {
        self.view.send_modify(|view| {
            *view = LedgerView {
                generation: view.generation + 1,
                ..LedgerView::default()
            };
        });
    }
}

/// Cancellation handle of a live subscription.
///
/// [`cancel`](Self::cancel) consumes the handle, so it runs at most once.
/// Dropping the handle without calling it cancels as well: a subscription
/// never outlives its handle.
#[must_use = "dropping the handle cancels the subscription"]
#[derive(Debug)]
pub struct SubscriptionHandle {
    shared: Arc<Shared>,
    generation: u64,
    owner: UserId,
    cancelled: bool,
}

impl SubscriptionHandle {
    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    /// Release the subscription. No snapshot is applied after this returns.
    pub fn cancel(mut self) {
        self.cancelled = true;
        self.shared.cancel(self.generation);
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if !self.cancelled {
            self.shared.cancel(self.generation);
        }
    }
}

/// Keeps a live, ordered view of one user's transactions.
///
/// Cloning is cheap; clones share the same subscription and view.
pub struct LedgerSync<S> {
    store: Arc<S>,
    shared: Arc<Shared>,
    /// Subscription opened on behalf of the identity signal.
    gated: Arc<Mutex<Option<SubscriptionHandle>>>,
}

impl<S> Clone for LedgerSync<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            shared: Arc::clone(&self.shared),
            gated: Arc::clone(&self.gated),
        }
    }
}

impl<S> std::fmt::Debug for LedgerSync<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerSync")
            .field("view", &*self.shared.view.borrow())
            .finish()
    }
}

impl<S: TransactionStore> LedgerSync<S> {
    pub fn new(store: Arc<S>) -> Self {
        let (view, _) = watch::channel(LedgerView::default());
        Self {
            store,
            shared: Arc::new(Shared {
                view,
                active: Mutex::new(None),
            }),
            gated: Arc::new(Mutex::new(None)),
        }
    }

    /// Open the live query on `user`'s transactions.
    ///
    /// Only one subscription exists per engine: a previous one that was not
    /// cancelled is cancelled first. Must be called inside a Tokio runtime.
    pub fn subscribe(&self, user: UserId) -> SubscriptionHandle {
        let mut active = self.shared.active();
        if let Some(previous) = active.take() {
            tracing::warn!(
                owner = %previous.owner,
                generation = previous.generation,
                "subscribe called while a subscription is open; cancelling it"
            );
            previous.task.abort();
        }

        let mut generation = 0;
        self.shared.view.send_modify(|view| {
            generation = view.generation + 1;
            *view = LedgerView {
                owner: Some(user.clone()),
                status: SyncStatus::Connecting,
                generation,
                ..LedgerView::default()
            };
        });

        tracing::info!(owner = %user, generation, "opening subscription");
        let stream = self.store.subscribe_query(&user);
        let task = tokio::spawn(consume(
            Arc::clone(&self.shared),
            stream,
            generation,
            user.clone(),
        ));

        *active = Some(Active {
            generation,
            owner: user.clone(),
            task: task.abort_handle(),
        });

        SubscriptionHandle {
            shared: Arc::clone(&self.shared),
            generation,
            owner: user,
            cancelled: false,
        }
    }

    /// Observe the view. The receiver sees every replacement.
    pub fn watch(&self) -> watch::Receiver<LedgerView> {
        self.shared.view.subscribe()
    }

    pub fn view(&self) -> LedgerView {
        self.shared.view.borrow().clone()
    }

    /// The most recent snapshot, newest first; empty before the first one.
    pub fn current_collection(&self) -> Vec<Transaction> {
        self.shared.view.borrow().transactions.to_vec()
    }

    pub fn filter_by_kind(&self, kind: TransactionKind) -> Vec<Transaction> {
        self.shared.view.borrow().filter_by_kind(kind)
    }

    pub fn aggregate(&self, kind: TransactionKind) -> MoneyCents {
        self.shared.view.borrow().aggregate(kind)
    }

    pub fn totals(&self) -> Totals {
        self.shared.view.borrow().totals
    }

    pub fn status(&self) -> SyncStatus {
        self.shared.view.borrow().status.clone()
    }

    pub fn owner(&self) -> Option<UserId> {
        self.shared.view.borrow().owner.clone()
    }

    fn gated(&self) -> MutexGuard<'_, Option<SubscriptionHandle>> {
        self.gated.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// React to one identity value.
    ///
    /// - `Unresolved`: nothing, the identity check is still running.
    /// - `Authenticated(u)`: subscribe to `u` unless already subscribed to it.
    /// - `Anonymous`: cancel.
    pub fn apply_identity(&self, identity: &IdentityState) {
        let mut gated = self.gated();
        match identity {
            IdentityState::Unresolved => {}
            IdentityState::Authenticated(user) => {
                if gated.as_ref().is_some_and(|handle| handle.owner() == user) {
                    return;
                }
                if let Some(previous) = gated.take() {
                    previous.cancel();
                }
                *gated = Some(self.subscribe(user.clone()));
            }
            IdentityState::Anonymous => {
                if let Some(previous) = gated.take() {
                    previous.cancel();
                }
            }
        }
    }

    /// Reopen the identity-driven subscription after a sync failure.
    ///
    /// Returns `false` when there is nothing to retry.
    pub fn resubscribe(&self) -> bool {
        let mut gated = self.gated();
        let Some(previous) = gated.take() else {
            return false;
        };
        let owner = previous.owner().clone();
        previous.cancel();
        *gated = Some(self.subscribe(owner));
        true
    }

    /// Drive the engine from an identity signal until its sender is dropped,
    /// then cancel whatever is still open.
    pub async fn follow_identity(&self, mut identity: watch::Receiver<IdentityState>) {
        loop {
            let state = identity.borrow_and_update().clone();
            self.apply_identity(&state);
            if identity.changed().await.is_err() {
                break;
            }
        }
        if let Some(handle) = self.gated().take() {
            handle.cancel();
        }
    }
}

/// Subscription task: applies snapshots until the stream fails, ends, or the
/// subscription is cancelled.
async fn consume(shared: Arc<Shared>, mut stream: SnapshotStream, generation: u64, owner: UserId) {
    let mut received_any = false;
    loop {
        let event = stream.next().await;
        let mut finished = false;
        let current = shared.view.send_if_modified(|view| {
            if view.generation != generation {
                return false;
            }
            match event {
                Some(Ok(snapshot)) => {
                    tracing::debug!(%owner, generation, count = snapshot.len(), "applying snapshot");
                    view.replace(snapshot);
                    received_any = true;
                }
                Some(Err(err)) => {
                    tracing::error!(%owner, generation, error = %err, "sync failed");
                    let failure = if received_any {
                        SyncFailure::Interrupted(err.to_string())
                    } else {
                        SyncFailure::Refused(err.to_string())
                    };
                    view.status = SyncStatus::Failed(failure);
                    finished = true;
                }
                None => {
                    tracing::error!(%owner, generation, "subscription closed by the store");
                    view.status = SyncStatus::Failed(SyncFailure::Closed);
                    finished = true;
                }
            }
            true
        });

        if !current || finished {
            return;
        }
    }
}
