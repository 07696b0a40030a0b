//! Store collaborator contract.
//!
//! The store is the single source of truth for transactions. The ledger only
//! needs three things from it: a live, owner-scoped query ordered by
//! `created_at` descending, an insert that stamps the record with the store's
//! own clock, and a delete by id.
//!
//! Live queries are modelled as an explicit stream of snapshots
//! ([`SnapshotStream`]) fed by a producer handle ([`SnapshotSink`]). Dropping
//! the stream is the unsubscribe: producers notice through
//! [`SnapshotSink::is_closed`] / [`SnapshotSink::closed`] and stop.

use std::future::Future;

use tokio::sync::mpsc;

use crate::{NewTransaction, StoreError, Transaction, TransactionId, UserId};

/// Name of the collection holding every user's transactions.
pub const COLLECTION: &str = "transactions";

/// One complete result set of a live query, newest first.
pub type Snapshot = Vec<Transaction>;

/// A single item delivered on a live query.
pub type SnapshotEvent = Result<Snapshot, StoreError>;

pub trait TransactionStore: Send + Sync + 'static {
    /// Open a live query over `owner_id`'s transactions.
    ///
    /// Must not block. If the query cannot be established the error is the
    /// first (and last) item of the returned stream.
    fn subscribe_query(&self, owner_id: &UserId) -> SnapshotStream;

    /// Insert a record; the store assigns `id` and `created_at`.
    fn insert(
        &self,
        record: NewTransaction,
    ) -> impl Future<Output = Result<TransactionId, StoreError>> + Send;

    /// Delete a record. Unknown ids are reported as [`StoreError::NotFound`].
    fn delete_by_id(
        &self,
        id: &TransactionId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Create a connected producer/consumer pair for one live query.
pub fn snapshot_channel() -> (SnapshotSink, SnapshotStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SnapshotSink { tx }, SnapshotStream { rx })
}

/// Producer side of a live query, held by the store.
#[derive(Clone, Debug)]
pub struct SnapshotSink {
    tx: mpsc::UnboundedSender<SnapshotEvent>,
}

impl SnapshotSink {
    /// Push a full snapshot. Returns `false` once the consumer has gone away.
    pub fn push(&self, snapshot: Snapshot) -> bool {
        self.tx.send(Ok(snapshot)).is_ok()
    }

    /// Report a terminal error. Nothing is delivered after it.
    pub fn fail(self, error: StoreError) {
        let _ = self.tx.send(Err(error));
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves when the consumer drops its [`SnapshotStream`].
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

/// Consumer side of a live query.
#[derive(Debug)]
pub struct SnapshotStream {
    rx: mpsc::UnboundedReceiver<SnapshotEvent>,
}

impl SnapshotStream {
    /// A stream whose only item is `error`: a query that was never established.
    pub fn refused(error: StoreError) -> Self {
        let (sink, stream) = snapshot_channel();
        sink.fail(error);
        stream
    }

    /// Next snapshot, or `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        self.rx.recv().await
    }
}
