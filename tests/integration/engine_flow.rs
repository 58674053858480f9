//! Navigation and lifecycle of a single engine run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

use waypoint::progress::{KvStore, MemoryKvStore};
use waypoint::workflow::{
    Destination, EngineMessage, ExitReason, IgnoreReason, Signal, Transition,
};
use waypoint::Error;

use super::fixtures::{config, failing, gated, memory_engine, plain, plain_pages, EXIT};

fn exited(reason: ExitReason, target: &str) -> Transition {
    Transition::Exited {
        reason,
        target: Destination::new(target),
    }
}

/// Given a 3-page workflow
/// When next is emitted on the last page
/// Then the workflow completes to the exit target and the hook sees to = len
#[tokio::test]
async fn test_next_on_last_page_completes() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let seen = calls.clone();
    let kv = MemoryKvStore::new();
    let mut engine = memory_engine(config(plain_pages(3)), &kv).with_advance_hook(move |from, to| {
        seen.lock().unwrap().push((from, to));
        async { Ok(()) }
    });

    engine.start().await;
    assert_ok!(engine.emit(Signal::Next).await);
    assert_ok!(engine.emit(Signal::Next).await);
    let last = engine.emit(Signal::Next).await.unwrap();

    assert_eq!(last, exited(ExitReason::Completed, EXIT));
    assert_eq!(*calls.lock().unwrap(), vec![(0, 1), (1, 2), (2, 3)]);
    assert!(engine.is_finished());
    // Completion does not write pages.len()
    assert_eq!(
        kv.get("workflow_progress_fixture").await.unwrap(),
        Some("2".to_string())
    );
}

/// Given a first-page back override
/// When back is emitted on step 0
/// Then control goes to the override, not the exit target
#[tokio::test]
async fn test_back_on_first_page_uses_override() {
    let kv = MemoryKvStore::new();
    let cfg = config(plain_pages(2)).with_first_page_back_target(Some("catalog".into()));
    let mut engine = memory_engine(cfg, &kv);

    engine.start().await;
    let t = engine.emit(Signal::Back).await.unwrap();
    assert_eq!(t, exited(ExitReason::Abandoned, "catalog"));
    assert_eq!(engine.exit().map(|(r, _)| r), Some(ExitReason::Abandoned));
}

#[tokio::test]
async fn test_back_on_first_page_without_override_uses_exit() {
    let kv = MemoryKvStore::new();
    let mut engine = memory_engine(config(plain_pages(2)), &kv);

    engine.start().await;
    assert_eq!(
        engine.emit(Signal::Back).await.unwrap(),
        exited(ExitReason::Abandoned, EXIT)
    );
}

/// The override applies to the first page only; back from later pages
/// just steps back.
#[tokio::test]
async fn test_override_not_used_after_first_page() {
    let kv = MemoryKvStore::new();
    let cfg = config(plain_pages(3)).with_first_page_back_target(Some("catalog".into()));
    let mut engine = memory_engine(cfg, &kv);

    engine.start().await;
    engine.emit(Signal::Next).await.unwrap();
    let t = engine.emit(Signal::Back).await.unwrap();
    assert_eq!(
        t,
        Transition::Entered {
            index: 0,
            initializing: false
        }
    );
    assert!(!engine.is_finished());
}

/// Single-page workflow: next completes, back abandons.
#[tokio::test]
async fn test_single_page_workflow() {
    let kv = MemoryKvStore::new();
    let mut engine = memory_engine(config(vec![plain("only")]), &kv);
    engine.start().await;
    assert_eq!(
        engine.emit(Signal::Next).await.unwrap(),
        exited(ExitReason::Completed, EXIT)
    );

    let mut engine = memory_engine(config(vec![plain("only")]), &kv);
    engine.start().await;
    assert_eq!(
        engine.emit(Signal::Back).await.unwrap(),
        exited(ExitReason::Abandoned, EXIT)
    );
}

/// Given a page whose initializer always fails
/// When the step is entered
/// Then is_initializing is set, then cleared, and the page renders ready
#[tokio::test]
async fn test_failing_initializer_renders_ready() {
    let calls = Arc::new(AtomicUsize::new(0));
    let kv = MemoryKvStore::new();
    let mut engine = memory_engine(
        config(vec![plain("start"), failing("flaky", calls.clone())]),
        &kv,
    );

    engine.start().await;
    let entered = engine.emit(Signal::Next).await.unwrap();
    assert_eq!(
        entered,
        Transition::Entered {
            index: 1,
            initializing: true
        }
    );
    let loading = engine.render().unwrap();
    assert!(loading.actions.iter().all(|a| !a.enabled));

    let ready = assert_ok!(engine.wait_ready().await);
    assert_eq!(
        ready,
        Some(Transition::Ready {
            index: 1,
            init_failed: true
        })
    );
    assert!(!engine.state().is_initializing);
    assert!(engine.render().unwrap().actions.iter().all(|a| a.enabled));
    // No automatic retry
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Re-entering a step runs its initializer again.
#[tokio::test]
async fn test_initializer_runs_once_per_entry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let kv = MemoryKvStore::new();
    let mut engine = memory_engine(
        config(vec![failing("counted", calls.clone()), plain("after")]),
        &kv,
    );

    engine.start().await;
    engine.wait_ready().await.unwrap();
    // Re-render does not re-run the initializer
    let _ = engine.render();
    let _ = engine.render();
    engine.emit(Signal::Next).await.unwrap();
    engine.emit(Signal::Back).await.unwrap();
    engine.wait_ready().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Given a page still initializing
/// When the page emits next
/// Then the signal is ignored and the step does not change
#[tokio::test]
async fn test_emits_ignored_while_initializing() {
    let gate = Arc::new(Notify::new());
    let kv = MemoryKvStore::new();
    let mut engine = memory_engine(
        config(vec![gated("slow", gate.clone()), plain("next")]),
        &kv,
    );

    engine.start().await;
    let emit = engine.props().emit;
    emit.next();
    let msg = engine.recv().await.unwrap();
    assert_eq!(
        engine.handle(msg).await.unwrap(),
        Transition::Ignored {
            reason: IgnoreReason::Initializing
        }
    );
    assert_eq!(engine.state().current_index, 0);

    gate.notify_one();
    engine.wait_ready().await.unwrap();
    assert_eq!(
        engine.emit(Signal::Next).await.unwrap(),
        Transition::Entered {
            index: 1,
            initializing: false
        }
    );
}

/// A double-fired next advances once.
#[tokio::test]
async fn test_duplicate_next_advances_once() {
    let kv = MemoryKvStore::new();
    let mut engine = memory_engine(config(plain_pages(4)), &kv);
    engine.start().await;

    let page = engine.render().unwrap();
    let next = page.find_action('n').unwrap();
    assert!(next.fire());
    assert!(next.fire());

    let mut transitions = Vec::new();
    while let Some(msg) = engine.try_recv() {
        transitions.push(engine.handle(msg).await.unwrap());
    }
    assert_eq!(
        transitions,
        vec![
            Transition::Entered {
                index: 1,
                initializing: false
            },
            Transition::Ignored {
                reason: IgnoreReason::StaleEntry
            },
        ]
    );
    assert_eq!(engine.state().current_index, 1);
}

/// An initializer result from an entry that is no longer current is dropped.
#[tokio::test]
async fn test_stale_initializer_result_dropped() {
    let kv = MemoryKvStore::new();
    let mut engine = memory_engine(config(plain_pages(2)), &kv);
    engine.start().await;
    let stale = engine.emitter().entry();
    engine.emit(Signal::Next).await.unwrap();

    let t = engine
        .handle(EngineMessage::Initialized {
            entry: stale,
            outcome: Err("late".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(
        t,
        Transition::Ignored {
            reason: IgnoreReason::StaleEntry
        }
    );
    assert!(!engine.state().is_initializing);
}

#[tokio::test]
async fn test_initializer_timeout_renders_ready() {
    let gate = Arc::new(Notify::new());
    let kv = MemoryKvStore::new();
    let mut engine = memory_engine(config(vec![gated("never", gate)]), &kv)
        .with_init_timeout(Some(Duration::from_millis(20)));

    engine.start().await;
    let ready = engine.wait_ready().await.unwrap();
    assert_eq!(
        ready,
        Some(Transition::Ready {
            index: 0,
            init_failed: true
        })
    );
}

/// A failing advance hook aborts the transition and surfaces the error.
#[tokio::test]
async fn test_hook_failure_keeps_step() {
    let kv = MemoryKvStore::new();
    let mut engine = memory_engine(config(plain_pages(2)), &kv)
        .with_advance_hook(|_, _| async { Err(Error::Validation("rejected".to_string())) });

    engine.start().await;
    let err = assert_err!(engine.emit(Signal::Next).await);
    assert!(err.to_string().contains("rejected"));
    assert_eq!(engine.state().current_index, 0);
    assert!(!engine.is_finished());

    // Completion is also blocked
    let mut engine = memory_engine(config(plain_pages(1)), &kv)
        .with_advance_hook(|_, _| async { Err(Error::Validation("rejected".to_string())) });
    engine.start().await;
    assert_err!(engine.emit(Signal::Next).await);
    assert!(!engine.is_finished());
}

/// After exit, nothing else is handled.
#[tokio::test]
async fn test_exit_is_terminal() {
    let kv = MemoryKvStore::new();
    let mut engine = memory_engine(config(plain_pages(2)), &kv);
    engine.start().await;
    engine.emit(Signal::Back).await.unwrap();

    assert_eq!(
        engine.emit(Signal::Next).await.unwrap(),
        Transition::Ignored {
            reason: IgnoreReason::Finished
        }
    );
    assert!(engine.render().is_none());
}
