#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{TimeZone, Utc};
use ledger::{
    LedgerSync, LedgerView, MoneyCents, NewTransaction, SnapshotSink, SnapshotStream, StoreError,
    Transaction, TransactionId, TransactionKind, TransactionStore, UserId, memory::Clock,
    snapshot_channel,
};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Wait until the engine's view satisfies `pred`.
pub async fn wait_for_view<S: TransactionStore>(
    engine: &LedgerSync<S>,
    pred: impl FnMut(&LedgerView) -> bool,
) -> LedgerView {
    let mut rx = engine.watch();
    let view = tokio::time::timeout(TIMEOUT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for the ledger view")
        .expect("engine dropped")
        .clone();
    view
}

/// Poll `check` until it holds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Server clock that advances one second per insert.
pub fn ticking_clock() -> Clock {
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
    let ticks = Arc::new(Mutex::new(0i64));
    Arc::new(move || {
        let mut ticks = ticks.lock().unwrap();
        *ticks += 1;
        base + chrono::Duration::seconds(*ticks)
    })
}

pub fn alice() -> UserId {
    UserId::from("alice")
}

pub fn entry(id: &str, kind: TransactionKind, cents: i64, second: u32) -> Transaction {
    Transaction {
        id: TransactionId::from(id),
        owner_id: alice(),
        kind,
        title: id.to_string(),
        amount: MoneyCents::new(cents),
        category: "Other".to_string(),
        created_at: Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, second).unwrap(),
    }
}

/// Store whose live queries are fed by the test itself.
#[derive(Default)]
pub struct ScriptedStore {
    sinks: Mutex<Vec<SnapshotSink>>,
}

impl ScriptedStore {
    /// Producer side of the `index`-th live query opened on this store.
    pub fn sink(&self, index: usize) -> SnapshotSink {
        self.sinks.lock().unwrap()[index].clone()
    }

    pub fn take_sink(&self, index: usize) -> SnapshotSink {
        self.sinks.lock().unwrap().remove(index)
    }

    pub fn opened(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }
}

impl TransactionStore for ScriptedStore {
    fn subscribe_query(&self, _owner_id: &UserId) -> SnapshotStream {
        let (sink, stream) = snapshot_channel();
        self.sinks.lock().unwrap().push(sink);
        stream
    }

    async fn insert(&self, _record: NewTransaction) -> Result<TransactionId, StoreError> {
        Err(StoreError::Unavailable("scripted store is read-only".to_string()))
    }

    async fn delete_by_id(&self, _id: &TransactionId) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("scripted store is read-only".to_string()))
    }
}
