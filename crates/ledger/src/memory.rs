//! In-process transaction store.
//!
//! Behaves like the remote document store as far as the ledger can tell: it
//! stamps inserts with its own clock, keeps every owner's records ordered
//! newest first and pushes a full snapshot to every live query of an owner
//! after each mutation. Used by the tests and by the host's offline mode.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    NewTransaction, StoreError, Transaction, TransactionId, UserId,
    store::{Snapshot, SnapshotSink, SnapshotStream, TransactionStore, snapshot_channel},
};

/// Source of the store's "server time".
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug)]
struct StoredRecord {
    /// Insert order, used to break `created_at` ties.
    seq: u64,
    transaction: Transaction,
}

#[derive(Debug)]
struct Subscriber {
    owner: UserId,
    sink: SnapshotSink,
}

#[derive(Debug, Default)]
struct Inner {
    records: Vec<StoredRecord>,
    next_seq: u64,
    subscribers: Vec<Subscriber>,
    fail_next_insert: Option<StoreError>,
    fail_next_delete: Option<StoreError>,
    refuse_subscriptions: Option<StoreError>,
    inserts: usize,
    deletes: usize,
}

impl Inner {
    fn snapshot(&self, owner: &UserId) -> Snapshot {
        let mut owned: Vec<&StoredRecord> = self
            .records
            .iter()
            .filter(|record| &record.transaction.owner_id == owner)
            .collect();
        owned.sort_by(|a, b| {
            b.transaction
                .created_at
                .cmp(&a.transaction.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        owned
            .into_iter()
            .map(|record| record.transaction.clone())
            .collect()
    }

    /// Push the current snapshot to every live query on `owner`, dropping
    /// subscribers whose stream is gone.
    fn publish(&mut self, owner: &UserId) {
        let snapshot = self.snapshot(owner);
        self.subscribers.retain(|subscriber| {
            if &subscriber.owner != owner {
                return !subscriber.sink.is_closed();
            }
            subscriber.sink.push(snapshot.clone())
        });
    }
}

/// A [`TransactionStore`] kept entirely in memory.
///
/// Cloning is cheap and every clone shares the same data.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    clock: Clock,
    write_gate: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemoryStore")
            .field("records", &inner.records.len())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    /// Build a store whose server time comes from `clock`.
    pub fn with_clock(clock: Clock) -> Self {
        let (write_gate, _) = watch::channel(true);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            clock,
            write_gate: Arc::new(write_gate),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn wait_for_writes(&self) {
        let mut gate = self.write_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
    }

    /// Number of insert calls received, failed ones included.
    pub fn insert_count(&self) -> usize {
        self.lock().inserts
    }

    /// Number of delete calls received, failed ones included.
    pub fn delete_count(&self) -> usize {
        self.lock().deletes
    }

    /// Number of live queries whose consumer is still attached.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|subscriber| !subscriber.sink.is_closed());
        inner.subscribers.len()
    }

    /// Every record currently stored for `owner`, newest first.
    pub fn records_of(&self, owner: &UserId) -> Snapshot {
        self.lock().snapshot(owner)
    }

    /// Make the next insert fail with `error`.
    pub fn fail_next_insert(&self, error: StoreError) {
        self.lock().fail_next_insert = Some(error);
    }

    /// Make the next delete fail with `error`.
    pub fn fail_next_delete(&self, error: StoreError) {
        self.lock().fail_next_delete = Some(error);
    }

    /// Refuse every new live query with `error` (`None` accepts them again).
    pub fn refuse_subscriptions(&self, error: Option<StoreError>) {
        self.lock().refuse_subscriptions = error;
    }

    /// Break every live query mid-stream with `error`.
    pub fn interrupt_subscriptions(&self, error: StoreError) {
        let subscribers = std::mem::take(&mut self.lock().subscribers);
        for subscriber in subscribers {
            subscriber.sink.fail(error.clone());
        }
    }

    /// Keep inserts and deletes pending until [`release_writes`](Self::release_writes).
    pub fn hold_writes(&self) {
        self.write_gate.send_replace(false);
    }

    pub fn release_writes(&self) {
        self.write_gate.send_replace(true);
    }
}

impl TransactionStore for MemoryStore {
    fn subscribe_query(&self, owner_id: &UserId) -> SnapshotStream {
        let mut inner = self.lock();
        if let Some(error) = inner.refuse_subscriptions.clone() {
            return SnapshotStream::refused(error);
        }

        let (sink, stream) = snapshot_channel();
        sink.push(inner.snapshot(owner_id));
        inner.subscribers.push(Subscriber {
            owner: owner_id.clone(),
            sink,
        });
        stream
    }

    async fn insert(&self, record: NewTransaction) -> Result<TransactionId, StoreError> {
        self.wait_for_writes().await;

        let mut inner = self.lock();
        inner.inserts += 1;
        if let Some(error) = inner.fail_next_insert.take() {
            return Err(error);
        }

        let id = TransactionId::new(Uuid::new_v4().to_string());
        let owner = record.owner_id.clone();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.records.push(StoredRecord {
            seq,
            transaction: record.into_transaction(id.clone(), (self.clock)()),
        });
        inner.publish(&owner);
        Ok(id)
    }

    async fn delete_by_id(&self, id: &TransactionId) -> Result<(), StoreError> {
        self.wait_for_writes().await;

        let mut inner = self.lock();
        inner.deletes += 1;
        if let Some(error) = inner.fail_next_delete.take() {
            return Err(error);
        }

        let position = inner
            .records
            .iter()
            .position(|record| &record.transaction.id == id)
            .ok_or(StoreError::NotFound)?;
        let removed = inner.records.remove(position);
        inner.publish(&removed.transaction.owner_id);
        Ok(())
    }
}
