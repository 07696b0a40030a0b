mod common;

use std::{sync::Arc, time::Duration};

use common::{ScriptedStore, alice, entry, eventually, ticking_clock, wait_for_view};
use ledger::{
    AddTransactionCmd, CommandGateway, IdentityProvider, IdentityState, LedgerSync, MemoryIdentity,
    MemoryStore, MoneyCents, StoreError, SyncFailure, SyncStatus, TransactionKind, UserId,
};

fn is_sorted_newest_first(engine: &LedgerSync<impl ledger::TransactionStore>) -> bool {
    engine
        .current_collection()
        .windows(2)
        .all(|pair| pair[0].created_at >= pair[1].created_at)
}

#[tokio::test]
async fn empty_ledger_has_no_entries_and_zero_totals() {
    let store = Arc::new(MemoryStore::new());
    let engine = LedgerSync::new(store);

    assert!(engine.current_collection().is_empty());
    let _handle = engine.subscribe(alice());
    wait_for_view(&engine, |v| v.status() == &SyncStatus::Live).await;

    assert!(engine.current_collection().is_empty());
    assert_eq!(engine.aggregate(TransactionKind::Expense), MoneyCents::ZERO);
    assert_eq!(engine.aggregate(TransactionKind::Investment), MoneyCents::ZERO);
}

#[tokio::test]
async fn every_snapshot_is_applied_newest_first() {
    let store = Arc::new(ScriptedStore::default());
    let engine = LedgerSync::new(store.clone());
    let _handle = engine.subscribe(alice());

    let sink = store.sink(0);
    sink.push(vec![
        entry("a", TransactionKind::Expense, 100, 1),
        entry("c", TransactionKind::Expense, 100, 30),
        entry("b", TransactionKind::Investment, 100, 10),
    ]);
    wait_for_view(&engine, |v| v.transactions().len() == 3).await;
    assert!(is_sorted_newest_first(&engine));
    let ids: Vec<_> = engine
        .current_collection()
        .into_iter()
        .map(|t| t.id.to_string())
        .collect();
    assert_eq!(ids, ["c", "b", "a"]);

    sink.push(vec![
        entry("d", TransactionKind::Investment, 100, 2),
        entry("e", TransactionKind::Expense, 100, 59),
    ]);
    wait_for_view(&engine, |v| v.transactions().len() == 2).await;
    assert!(is_sorted_newest_first(&engine));
}

#[tokio::test]
async fn totals_are_recomputed_from_each_full_snapshot() {
    let store = Arc::new(ScriptedStore::default());
    let engine = LedgerSync::new(store.clone());
    let _handle = engine.subscribe(alice());
    let sink = store.sink(0);

    sink.push(vec![
        entry("a", TransactionKind::Expense, 1000, 1),
        entry("b", TransactionKind::Expense, 250, 2),
        entry("c", TransactionKind::Investment, 10000, 3),
    ]);
    let view = wait_for_view(&engine, |v| v.transactions().len() == 3).await;
    assert_eq!(view.aggregate(TransactionKind::Expense), MoneyCents::new(1250));
    assert_eq!(view.aggregate(TransactionKind::Investment), MoneyCents::new(10000));

    // "a" disappears: the store's snapshot is authoritative.
    sink.push(vec![
        entry("b", TransactionKind::Expense, 250, 2),
        entry("c", TransactionKind::Investment, 10000, 3),
    ]);
    let view = wait_for_view(&engine, |v| v.transactions().len() == 2).await;
    assert_eq!(view.aggregate(TransactionKind::Expense), MoneyCents::new(250));
    assert_eq!(
        view.filter_by_kind(TransactionKind::Expense)
            .iter()
            .map(|t| t.id.to_string())
            .collect::<Vec<_>>(),
        ["b"]
    );
}

#[tokio::test]
async fn refused_subscription_is_reported() {
    let store = Arc::new(MemoryStore::new());
    store.refuse_subscriptions(Some(StoreError::Rejected("permission denied".to_string())));
    let engine = LedgerSync::new(store);

    let _handle = engine.subscribe(alice());
    let view = wait_for_view(&engine, |v| v.failure().is_some()).await;

    assert!(matches!(view.failure(), Some(SyncFailure::Refused(_))));
    assert!(view.transactions().is_empty());
}

#[tokio::test]
async fn interrupted_subscription_keeps_stale_data_and_reports_failure() {
    let store = Arc::new(MemoryStore::with_clock(ticking_clock()));
    let engine = LedgerSync::new(store.clone());
    let gateway = CommandGateway::new(store.clone());
    let _handle = engine.subscribe(alice());

    gateway
        .add(AddTransactionCmd::new(
            alice(),
            TransactionKind::Expense,
            "Rent",
            "800",
            "Bills",
        ))
        .await
        .unwrap();
    wait_for_view(&engine, |v| v.transactions().len() == 1).await;

    store.interrupt_subscriptions(StoreError::Subscription("connection reset".to_string()));
    let view = wait_for_view(&engine, |v| v.failure().is_some()).await;

    assert!(matches!(view.failure(), Some(SyncFailure::Interrupted(_))));
    assert_eq!(view.transactions().len(), 1);
    assert_eq!(view.aggregate(TransactionKind::Expense), MoneyCents::new(80000));
}

#[tokio::test]
async fn stream_ending_without_cancel_is_a_failure() {
    let store = Arc::new(ScriptedStore::default());
    let engine = LedgerSync::new(store.clone());
    let _handle = engine.subscribe(alice());

    let sink = store.take_sink(0);
    sink.push(Vec::new());
    wait_for_view(&engine, |v| v.status() == &SyncStatus::Live).await;
    drop(sink);

    let view = wait_for_view(&engine, |v| v.failure().is_some()).await;
    assert_eq!(view.failure(), Some(&SyncFailure::Closed));
}

#[tokio::test]
async fn resubscribe_recovers_after_failure() {
    let store = Arc::new(MemoryStore::new());
    let engine = LedgerSync::new(store.clone());
    engine.apply_identity(&IdentityState::Authenticated(alice()));
    wait_for_view(&engine, |v| v.status() == &SyncStatus::Live).await;

    store.interrupt_subscriptions(StoreError::Unavailable("offline".to_string()));
    wait_for_view(&engine, |v| v.failure().is_some()).await;

    assert!(engine.resubscribe());
    let view = wait_for_view(&engine, |v| v.status() == &SyncStatus::Live).await;
    assert_eq!(view.owner(), Some(&alice()));
}

#[tokio::test]
async fn cancel_is_immediate_and_releases_the_query() {
    let store = Arc::new(ScriptedStore::default());
    let engine = LedgerSync::new(store.clone());
    let handle = engine.subscribe(alice());
    let sink = store.sink(0);

    sink.push(vec![entry("a", TransactionKind::Expense, 100, 1)]);
    wait_for_view(&engine, |v| v.transactions().len() == 1).await;

    handle.cancel();
    assert_eq!(engine.status(), SyncStatus::Idle);
    assert!(engine.current_collection().is_empty());
    assert_eq!(engine.owner(), None);

    // Whatever the store still sends is ignored.
    sink.push(vec![entry("b", TransactionKind::Expense, 100, 2)]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(engine.current_collection().is_empty());

    tokio::time::timeout(Duration::from_secs(5), sink.closed())
        .await
        .expect("query should be released after cancel");
}

#[tokio::test]
async fn dropping_the_handle_cancels() {
    let store = Arc::new(MemoryStore::new());
    let engine = LedgerSync::new(store.clone());

    let handle = engine.subscribe(alice());
    wait_for_view(&engine, |v| v.status() == &SyncStatus::Live).await;
    assert_eq!(store.subscriber_count(), 1);

    drop(handle);
    assert_eq!(engine.status(), SyncStatus::Idle);
    eventually(|| store.subscriber_count() == 0).await;
}

#[tokio::test]
async fn subscribing_again_replaces_the_previous_query() {
    let store = Arc::new(MemoryStore::new());
    let engine = LedgerSync::new(store.clone());

    let first = engine.subscribe(alice());
    let _second = engine.subscribe(UserId::from("bob"));
    wait_for_view(&engine, |v| v.status() == &SyncStatus::Live).await;
    eventually(|| store.subscriber_count() == 1).await;

    // The stale handle no longer owns anything.
    first.cancel();
    assert_eq!(engine.owner(), Some(UserId::from("bob")));
    assert_eq!(engine.status(), SyncStatus::Live);
}

#[tokio::test]
async fn identity_gates_the_subscription() {
    let store = Arc::new(MemoryStore::new());
    let engine = LedgerSync::new(store.clone());

    engine.apply_identity(&IdentityState::Unresolved);
    assert_eq!(engine.status(), SyncStatus::Idle);
    assert_eq!(store.subscriber_count(), 0);

    engine.apply_identity(&IdentityState::Authenticated(alice()));
    wait_for_view(&engine, |v| v.status() == &SyncStatus::Live).await;
    engine.apply_identity(&IdentityState::Authenticated(alice()));
    assert_eq!(store.subscriber_count(), 1);

    engine.apply_identity(&IdentityState::Anonymous);
    assert_eq!(engine.status(), SyncStatus::Idle);
    assert_eq!(engine.owner(), None);
    eventually(|| store.subscriber_count() == 0).await;
}

#[tokio::test]
async fn follows_the_identity_signal() {
    let store = Arc::new(MemoryStore::new());
    let engine = LedgerSync::new(store.clone());
    let identity = MemoryIdentity::builder()
        .account("alice@example.com", "hunter2", "alice")
        .build();

    let follower = tokio::spawn({
        let engine = engine.clone();
        let signal = identity.state();
        async move { engine.follow_identity(signal).await }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(store.subscriber_count(), 0, "no query while unresolved");

    identity.resolve_session(Some(alice()));
    let view = wait_for_view(&engine, |v| v.status() == &SyncStatus::Live).await;
    assert_eq!(view.owner(), Some(&alice()));

    identity.logout().await;
    wait_for_view(&engine, |v| v.owner().is_none()).await;
    eventually(|| store.subscriber_count() == 0).await;

    drop(identity);
    tokio::time::timeout(Duration::from_secs(5), follower)
        .await
        .expect("follower should stop once the signal is gone")
        .unwrap();
}
