//! Scripted, terminal-free runs.
//!
//! Feeds a fixed list of signals to an engine, waiting for each step to
//! become ready first, and reports every transition as JSON.

use serde::Serialize;

use crate::host::WorkflowRun;
use crate::progress::KvStore;
use crate::workflow::{
    Destination, EngineState, ExitReason, Signal, Transition, WorkflowEngine,
};
use crate::{wlog, Result};

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// `None` for transitions the engine produced on its own (start, ready).
    pub signal: Option<Signal>,
    pub transition: Transition,
    pub page_id: Option<String>,
    pub state: EngineState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExitSummary {
    pub reason: ExitReason,
    pub target: Destination,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeadlessReport {
    pub run_id: String,
    pub workflow_id: String,
    pub page_set: String,
    pub steps: Vec<StepRecord>,
    pub final_state: EngineState,
    pub exit: Option<ExitSummary>,
}

/// Parse `next,back,next`. Blank entries are skipped.
pub fn parse_script(script: &str) -> Result<Vec<Signal>> {
    script
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Signal>())
        .collect()
}

/// Run `script` to the end or until the workflow exits. Signals left over
/// after an exit are not sent.
pub async fn run<S: KvStore>(run: WorkflowRun<S>, script: &[Signal]) -> Result<HeadlessReport> {
    let WorkflowRun {
        mut engine,
        page_set,
        ..
    } = run;
    let mut steps = Vec::new();

    let started = engine.start().await;
    record(&mut steps, &engine, None, started);
    if let Some(ready) = engine.wait_ready().await? {
        record(&mut steps, &engine, None, ready);
    }

    for &signal in script {
        if engine.is_finished() {
            wlog!("Headless run finished with signals left over");
            break;
        }
        let transition = engine.emit(signal).await?;
        record(&mut steps, &engine, Some(signal), transition);
        if let Some(ready) = engine.wait_ready().await? {
            record(&mut steps, &engine, None, ready);
        }
    }

    let exit = engine.exit().map(|(reason, target)| ExitSummary {
        reason,
        target: target.clone(),
    });

    Ok(HeadlessReport {
        run_id: engine.run_id().to_string(),
        workflow_id: engine.config().workflow_id().to_string(),
        page_set: page_set.to_string(),
        steps,
        final_state: engine.state(),
        exit,
    })
}

fn record<S: KvStore>(
    steps: &mut Vec<StepRecord>,
    engine: &WorkflowEngine<S>,
    signal: Option<Signal>,
    transition: Transition,
) {
    steps.push(StepRecord {
        signal,
        transition,
        page_id: engine.current_page().map(|p| p.id().to_string()),
        state: engine.state(),
    });
}
