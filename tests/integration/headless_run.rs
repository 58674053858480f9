//! Scripted runs and their JSON report.

use std::sync::Arc;

use waypoint::config::Config;
use waypoint::headless::{self, parse_script};
use waypoint::host::{RouteParams, WorkflowHost};
use waypoint::progress::{MemoryKvStore, ProgressStore};
use waypoint::workflow::{Destination, ExitReason, Signal, Transition, WorkflowId};

fn host() -> WorkflowHost<MemoryKvStore> {
    WorkflowHost::new(
        Arc::new(ProgressStore::new(MemoryKvStore::new())),
        Config::default(),
    )
}

fn seller() -> RouteParams {
    RouteParams::new(WorkflowId::new("seller-onboarding"))
}

#[tokio::test]
async fn test_script_completes_seller_onboarding() {
    let host = host();
    let run = host.engine(&seller()).unwrap();
    let script = parse_script("next,next,next,next,next").unwrap();

    let report = headless::run(run, &script).await.unwrap();
    let exit = report.exit.expect("workflow exited");
    assert_eq!(exit.reason, ExitReason::Completed);
    assert_eq!(exit.target, Destination::new("home"));
    assert_eq!(report.page_set, "seller-onboarding");

    // Entering the profile page records its ready transition too
    assert!(report.steps.iter().any(|s| s.signal.is_none()
        && matches!(s.transition, Transition::Ready { index: 1, init_failed: false })));
    assert!(report.steps.last().unwrap().transition.is_exit());
}

#[tokio::test]
async fn test_signals_after_exit_are_not_sent() {
    let host = host();
    let run = host.engine(&seller()).unwrap();
    let script = parse_script("back,next,next").unwrap();

    let report = headless::run(run, &script).await.unwrap();
    assert_eq!(report.exit.map(|e| e.reason), Some(ExitReason::Abandoned));

    let sent: Vec<_> = report.steps.iter().filter_map(|s| s.signal).collect();
    assert_eq!(sent, vec![Signal::Back]);
    assert_eq!(
        host.progress().get_progress(&WorkflowId::new("seller-onboarding")).await,
        0
    );
}

/// A script that stops early leaves the run open with progress saved.
#[tokio::test]
async fn test_partial_script_resumes_later() {
    let host = host();
    let report = headless::run(host.engine(&seller()).unwrap(), &[Signal::Next, Signal::Next])
        .await
        .unwrap();
    assert!(report.exit.is_none());
    assert_eq!(report.final_state.current_index, 2);

    let report = headless::run(host.engine(&seller()).unwrap(), &[])
        .await
        .unwrap();
    assert_eq!(report.final_state.current_index, 2);
    assert_eq!(report.steps[0].page_id.as_deref(), Some("location"));
}

#[tokio::test(start_paused = true)]
async fn test_demo_report_serializes() {
    let host = host();
    let run = host
        .engine(&RouteParams::new(WorkflowId::new("demo")))
        .unwrap();
    let report = headless::run(run, &[Signal::Next, Signal::Next, Signal::Back])
        .await
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["workflow_id"], "demo");
    assert_eq!(json["final_state"]["current_index"], 1);
    assert_eq!(json["final_state"]["is_initializing"], false);
    assert!(json["exit"].is_null());

    let kinds: Vec<_> = json["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["transition"]["kind"].as_str().unwrap().to_string())
        .collect();
    // start, next -> loading, ready, next -> finish, back -> loading, ready
    assert_eq!(
        kinds,
        vec!["entered", "entered", "ready", "entered", "entered", "ready"]
    );
}
