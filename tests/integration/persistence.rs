//! Resume points across engine restarts.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio_test::{assert_err, assert_ok};

use waypoint::progress::{KvStore, MemoryKvStore, ProgressStore};
use waypoint::workflow::{Signal, Transition, WorkflowEngine, WorkflowId};
use waypoint::Error;

use super::fixtures::{
    config, memory_engine, plain_pages, FlakyReadKv, ReadOnlyKv, TempStore, UnreachableKv,
    WORKFLOW,
};

const KEY: &str = "workflow_progress_fixture";

async fn stored(kv: &impl KvStore) -> Option<String> {
    kv.get(KEY).await.unwrap()
}

/// Given 3 pages, persistence on and an empty store
/// When next, next, back, then a restart
/// Then the store holds 2 throughout and the restart resumes at 2
#[tokio::test]
async fn test_three_page_scenario() {
    let kv = MemoryKvStore::new();
    let mut engine = memory_engine(config(plain_pages(3)), &kv);

    engine.start().await;
    assert_eq!(engine.state().current_index, 0);
    assert_eq!(stored(&kv).await, None);

    engine.emit(Signal::Next).await.unwrap();
    engine.emit(Signal::Next).await.unwrap();
    assert_eq!(engine.state().current_index, 2);
    assert_eq!(stored(&kv).await.as_deref(), Some("2"));

    engine.emit(Signal::Back).await.unwrap();
    assert_eq!(engine.state().current_index, 1);
    assert_eq!(stored(&kv).await.as_deref(), Some("2"));

    drop(engine);
    let mut restarted = memory_engine(config(plain_pages(3)), &kv);
    restarted.start().await;
    assert_eq!(restarted.state().current_index, 2);
}

/// The stored value is the max of every forward target, whatever backs
/// happen in between.
#[tokio::test]
async fn test_stored_value_is_max_of_forward_targets() {
    let kv = MemoryKvStore::new();
    let mut engine = memory_engine(config(plain_pages(5)), &kv);
    engine.start().await;

    let script = [
        Signal::Next,
        Signal::Next,
        Signal::Next,
        Signal::Back,
        Signal::Back,
        Signal::Next,
        Signal::Back,
    ];
    for signal in script {
        engine.emit(signal).await.unwrap();
    }
    assert_eq!(engine.state().current_index, 1);
    assert_eq!(stored(&kv).await.as_deref(), Some("3"));
}

/// Back never writes.
#[tokio::test]
async fn test_back_never_changes_store() {
    let kv = MemoryKvStore::new();
    kv.set(KEY, "3").await.unwrap();
    let mut engine = memory_engine(config(plain_pages(5)), &kv);

    engine.start().await;
    assert_eq!(engine.state().current_index, 3);
    for _ in 0..3 {
        engine.emit(Signal::Back).await.unwrap();
    }
    assert_eq!(engine.state().current_index, 0);
    assert_eq!(stored(&kv).await.as_deref(), Some("3"));
}

/// A stored index past the end clamps to the last page.
#[tokio::test]
async fn test_resume_clamps_out_of_range() {
    let kv = MemoryKvStore::new();
    kv.set(KEY, "7").await.unwrap();
    let mut engine = memory_engine(config(plain_pages(3)), &kv);
    engine.start().await;
    assert_eq!(engine.state().current_index, 2);

    // Exactly len also clamps
    kv.set(KEY, "3").await.unwrap();
    let engine = memory_engine(config(plain_pages(3)), &kv);
    assert_eq!(engine.resolve_initial_index().await, 2);
}

#[tokio::test]
async fn test_malformed_record_starts_at_zero() {
    let kv = MemoryKvStore::new();
    kv.set(KEY, "two").await.unwrap();
    let mut engine = memory_engine(config(plain_pages(3)), &kv);
    engine.start().await;
    assert_eq!(engine.state().current_index, 0);
}

/// An unreadable store reads as 0 and never fails the start.
#[tokio::test]
async fn test_unreadable_store_starts_at_zero() {
    let progress = Arc::new(ProgressStore::new(UnreachableKv));
    let mut engine = WorkflowEngine::new(config(plain_pages(3)), progress);
    assert_eq!(
        engine.start().await,
        Transition::Entered {
            index: 0,
            initializing: false
        }
    );
}

/// With persistence disabled the store is neither read nor written.
#[tokio::test]
async fn test_persistence_disabled_is_in_memory() {
    let kv = MemoryKvStore::new();
    kv.set(KEY, "2").await.unwrap();
    let cfg = config(plain_pages(3)).with_persistence(false);
    let mut engine = memory_engine(cfg, &kv);

    engine.start().await;
    assert_eq!(engine.state().current_index, 0);
    engine.emit(Signal::Next).await.unwrap();
    engine.emit(Signal::Next).await.unwrap();
    assert_eq!(stored(&kv).await.as_deref(), Some("2"));

    kv.remove(KEY).await.unwrap();
    let mut engine = memory_engine(config(plain_pages(3)).with_persistence(false), &kv);
    engine.start().await;
    engine.emit(Signal::Next).await.unwrap();
    assert_eq!(stored(&kv).await, None);
}

/// A failed write is returned and the visible step does not move.
#[tokio::test]
async fn test_write_failure_leaves_state_unchanged() {
    let kv = ReadOnlyKv::default();
    let progress = Arc::new(ProgressStore::new(kv.clone()));
    let mut engine = WorkflowEngine::new(config(plain_pages(3)), progress);

    engine.start().await;
    let err = assert_err!(engine.emit(Signal::Next).await);
    assert!(matches!(err, Error::ProgressWrite { .. }));
    assert_eq!(engine.state().current_index, 0);

    // Back needs no write and still works
    assert_ok!(engine.emit(Signal::Back).await);
    assert!(engine.is_finished());
}

/// Given a stored index of 3 and a store whose reads start failing after resume
/// When next is emitted from step 3
/// Then the transition fails and the record is not lowered
#[tokio::test]
async fn test_unreadable_record_is_never_lowered() {
    let kv = FlakyReadKv::default();
    kv.inner.set(KEY, "3").await.unwrap();
    let progress = Arc::new(ProgressStore::new(kv.clone()));
    let mut engine = WorkflowEngine::new(config(plain_pages(5)), progress);

    engine.start().await;
    assert_eq!(engine.state().current_index, 3);
    engine.emit(Signal::Back).await.unwrap();
    engine.emit(Signal::Back).await.unwrap();

    kv.fail_reads.store(true, Ordering::SeqCst);
    let err = assert_err!(engine.emit(Signal::Next).await);
    assert!(matches!(err, Error::ProgressWrite { .. }));
    assert_eq!(engine.state().current_index, 1);
    assert_eq!(stored(&kv.inner).await.as_deref(), Some("3"));

    kv.fail_reads.store(false, Ordering::SeqCst);
    assert_ok!(engine.emit(Signal::Next).await);
    assert_eq!(engine.state().current_index, 2);
    assert_eq!(stored(&kv.inner).await.as_deref(), Some("3"));
}

/// Same scenario against the JSON file backend.
#[tokio::test]
async fn test_file_store_survives_restart() {
    let store = TempStore::new();

    let mut engine = store.engine(config(plain_pages(4)));
    engine.start().await;
    engine.emit(Signal::Next).await.unwrap();
    engine.emit(Signal::Next).await.unwrap();
    engine.emit(Signal::Back).await.unwrap();
    drop(engine);

    let contents = std::fs::read_to_string(store.kv().path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(json[KEY], "2");

    let mut engine = store.engine(config(plain_pages(4)));
    engine.start().await;
    assert_eq!(engine.state().current_index, 2);
}

/// Two workflows in one file keep separate records.
#[tokio::test]
async fn test_file_store_keeps_workflows_apart() {
    let store = TempStore::new();
    let progress = ProgressStore::new(store.kv());

    progress
        .save_progress(&WorkflowId::new("demo"), 1)
        .await
        .unwrap();
    progress
        .save_progress(&WorkflowId::new(WORKFLOW), 2)
        .await
        .unwrap();
    progress
        .clear_progress(&WorkflowId::new("demo"))
        .await
        .unwrap();

    let records = progress.list_progress().await.unwrap();
    assert_eq!(records, vec![(WorkflowId::new(WORKFLOW), 2)]);
}

/// A corrupt progress file reads as 0 and the next forward step repairs it.
#[tokio::test]
async fn test_corrupt_file_recovers() {
    let store = TempStore::new();
    std::fs::write(store.kv().path(), "{{{").unwrap();

    let mut engine = store.engine(config(plain_pages(3)));
    engine.start().await;
    assert_eq!(engine.state().current_index, 0);
    assert_ok!(engine.emit(Signal::Next).await);

    let progress = ProgressStore::new(store.kv());
    assert_eq!(progress.get_progress(&WorkflowId::new(WORKFLOW)).await, 1);
}
