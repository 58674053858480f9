//! The step state machine.
//!
//! `WorkflowEngine` owns `{current_index, is_initializing}` for one run of a
//! workflow. Pages talk to it only through `Emitter`s; initializers report
//! back through the same channel. Every step-entry bumps an entry tag, and any
//! message carrying an older tag is dropped, which covers double-clicked
//! `next` as well as initializers of a step the user already left.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::page::{Emitter, PageDefinition, PageProps, PageView};
use super::types::{Destination, ExitReason, Signal, WorkflowConfiguration};
use crate::progress::{KvStore, ProgressStore};
use crate::util::with_timeout;
use crate::{wlog, wlog_debug, wlog_trace, wlog_warn, Error, Result};

/// Called on every forward transition with `(from, to)` before the new index
/// is committed; `to == page_count` on completion.
pub type AdvanceHook = Arc<dyn Fn(usize, usize) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Messages the engine consumes.
#[derive(Debug, Clone)]
pub enum EngineMessage {
    Signal { entry: u64, signal: Signal },
    Initialized {
        entry: u64,
        outcome: std::result::Result<(), String>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineState {
    pub current_index: usize,
    pub is_initializing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    NotStarted,
    AlreadyStarted,
    StaleEntry,
    Initializing,
    Finished,
}

/// Outcome of one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// A step was entered; `initializing` when its initializer is running.
    Entered { index: usize, initializing: bool },
    /// The initializer of the current step finished.
    Ready { index: usize, init_failed: bool },
    /// Control left the workflow.
    Exited {
        reason: ExitReason,
        target: Destination,
    },
    Ignored { reason: IgnoreReason },
}

impl Transition {
    pub fn is_exit(&self) -> bool {
        matches!(self, Transition::Exited { .. })
    }
}

pub struct WorkflowEngine<S> {
    config: WorkflowConfiguration,
    progress: Arc<ProgressStore<S>>,
    on_advance: Option<AdvanceHook>,
    init_timeout: Option<Duration>,
    state: EngineState,
    entry: u64,
    started: bool,
    finished: Option<(ExitReason, Destination)>,
    run_id: Uuid,
    tx: mpsc::UnboundedSender<EngineMessage>,
    rx: mpsc::UnboundedReceiver<EngineMessage>,
}

impl<S: KvStore> WorkflowEngine<S> {
    pub fn new(config: WorkflowConfiguration, progress: Arc<ProgressStore<S>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            config,
            progress,
            on_advance: None,
            init_timeout: None,
            state: EngineState::default(),
            entry: 0,
            started: false,
            finished: None,
            run_id: Uuid::new_v4(),
            tx,
            rx,
        }
    }

    pub fn with_advance_hook<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(usize, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_advance = Some(Arc::new(move |from, to| hook(from, to).boxed()));
        self
    }

    /// Initializers running longer than `limit` count as failed.
    pub fn with_init_timeout(mut self, limit: Option<Duration>) -> Self {
        self.init_timeout = limit;
        self
    }

    /// Resolve the initial step and enter it. Only the first call does anything.
    pub async fn start(&mut self) -> Transition {
        if self.started {
            return Transition::Ignored {
                reason: IgnoreReason::AlreadyStarted,
            };
        }
        self.started = true;
        let index = self.resolve_initial_index().await;
        wlog!(
            "Workflow '{}' started at step {}/{} (run {}, persistence={})",
            self.config.workflow_id(),
            index,
            self.config.page_count(),
            self.run_id,
            self.config.persistence_enabled()
        );
        self.enter_step(index)
    }

    /// 0 without persistence, otherwise the stored index clamped to the last page.
    pub async fn resolve_initial_index(&self) -> usize {
        if !self.config.persistence_enabled() {
            return 0;
        }
        let stored = self.progress.get_progress(self.config.workflow_id()).await;
        let last = self.config.page_count().saturating_sub(1);
        if stored > last {
            wlog_debug!(
                "Clamping resumed step {} to {} for '{}'",
                stored,
                last,
                self.config.workflow_id()
            );
        }
        stored.min(last)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &WorkflowConfiguration {
        &self.config
    }

    /// The page being shown; `None` before start and after exit.
    pub fn current_page(&self) -> Option<&PageDefinition> {
        if !self.started || self.finished.is_some() {
            return None;
        }
        self.config.pages().get(self.state.current_index)
    }

    /// Emitter bound to the current step-entry.
    pub fn emitter(&self) -> Emitter {
        Emitter::new(self.entry, self.tx.clone())
    }

    pub fn props(&self) -> PageProps {
        PageProps {
            emit: self.emitter(),
            is_initializing: self.state.is_initializing,
        }
    }

    pub fn render(&self) -> Option<PageView> {
        self.current_page().map(|page| page.render(&self.props()))
    }

    /// Shorthand for handling `signal` from the current step-entry.
    pub async fn emit(&mut self, signal: Signal) -> Result<Transition> {
        let entry = self.entry;
        self.handle(EngineMessage::Signal { entry, signal }).await
    }

    /// Apply one message. Errors come only from the forward transition
    /// (progress write or advance hook) and leave the state unchanged.
    pub async fn handle(&mut self, msg: EngineMessage) -> Result<Transition> {
        wlog_trace!("Engine {} handling {:?}", self.run_id, msg);
        if !self.started {
            return Ok(ignored(IgnoreReason::NotStarted));
        }
        if self.finished.is_some() {
            return Ok(ignored(IgnoreReason::Finished));
        }

        match msg {
            EngineMessage::Signal { entry, signal } => {
                if entry != self.entry {
                    wlog_debug!("Dropping stale {} (entry {} != {})", signal, entry, self.entry);
                    return Ok(ignored(IgnoreReason::StaleEntry));
                }
                if self.state.is_initializing {
                    wlog_debug!("Dropping {} while step {} initializes", signal, self.state.current_index);
                    return Ok(ignored(IgnoreReason::Initializing));
                }
                self.transition(signal).await
            }
            EngineMessage::Initialized { entry, outcome } => {
                if entry != self.entry || !self.state.is_initializing {
                    wlog_debug!("Discarding initializer result for entry {}", entry);
                    return Ok(ignored(IgnoreReason::StaleEntry));
                }
                self.state.is_initializing = false;
                let index = self.state.current_index;
                let init_failed = match outcome {
                    Ok(()) => false,
                    Err(reason) => {
                        wlog_warn!(
                            "Initializer of page '{}' failed: {}",
                            self.page_id(index),
                            reason
                        );
                        true
                    }
                };
                Ok(Transition::Ready { index, init_failed })
            }
        }
    }

    /// Wait for the next message on the engine channel.
    pub async fn recv(&mut self) -> Option<EngineMessage> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<EngineMessage> {
        self.rx.try_recv().ok()
    }

    /// Process messages until the current step is ready. Signals that arrive
    /// in the meantime are dropped as the guard requires. Returns the `Ready`
    /// transition, or `None` if nothing was pending.
    pub async fn wait_ready(&mut self) -> Result<Option<Transition>> {
        while self.state.is_initializing && self.finished.is_none() {
            let Some(msg) = self.rx.recv().await else {
                break;
            };
            let transition = self.handle(msg).await?;
            if matches!(transition, Transition::Ready { .. }) {
                return Ok(Some(transition));
            }
        }
        Ok(None)
    }

    /// Why and where the workflow ended, once it has.
    pub fn exit(&self) -> Option<(ExitReason, &Destination)> {
        self.finished.as_ref().map(|(reason, target)| (*reason, target))
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    pub fn page_count(&self) -> usize {
        self.config.page_count()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn progress(&self) -> &Arc<ProgressStore<S>> {
        &self.progress
    }

    async fn transition(&mut self, signal: Signal) -> Result<Transition> {
        let from = self.state.current_index;
        let len = self.config.page_count();

        match signal {
            Signal::Next if from + 1 >= len => {
                self.run_hook(from, len).await?;
                let target = self.config.exit_target().clone();
                Ok(self.finish(ExitReason::Completed, target))
            }
            Signal::Next => {
                let to = from + 1;
                if self.config.persistence_enabled() {
                    self.progress
                        .save_progress(self.config.workflow_id(), to)
                        .await?;
                }
                self.run_hook(from, to).await?;
                wlog_debug!("'{}' next: {} -> {}", self.config.workflow_id(), from, to);
                Ok(self.enter_step(to))
            }
            Signal::Back if from == 0 => {
                let target = self
                    .config
                    .first_page_back_target()
                    .unwrap_or(self.config.exit_target())
                    .clone();
                Ok(self.finish(ExitReason::Abandoned, target))
            }
            Signal::Back => {
                wlog_debug!("'{}' back: {} -> {}", self.config.workflow_id(), from, from - 1);
                Ok(self.enter_step(from - 1))
            }
        }
    }

    async fn run_hook(&self, from: usize, to: usize) -> Result<()> {
        let Some(hook) = &self.on_advance else {
            return Ok(());
        };
        hook(from, to).await.map_err(|e| match e {
            e @ Error::AdvanceHook { .. } => e,
            other => Error::AdvanceHook {
                from,
                to,
                reason: other.to_string(),
            },
        })
    }

    fn enter_step(&mut self, index: usize) -> Transition {
        self.entry += 1;
        self.state.current_index = index;

        let initializer = self.config.pages().get(index).and_then(|p| p.initializer());
        let Some(init) = initializer else {
            self.state.is_initializing = false;
            return Transition::Entered {
                index,
                initializing: false,
            };
        };

        self.state.is_initializing = true;
        let tx = self.tx.clone();
        let entry = self.entry;
        let limit = self.init_timeout;
        wlog_debug!("Initializing page '{}' (entry {})", self.page_id(index), entry);

        tokio::spawn(async move {
            // Inner task so a panicking initializer surfaces as a join error
            let task = tokio::spawn(init());
            let outcome = with_timeout(limit, async move {
                task.await.map_err(|e| Error::TaskJoin(e.to_string()))?
            })
            .await
            .map_err(|e| e.to_string());
            let _ = tx.send(EngineMessage::Initialized { entry, outcome });
        });

        Transition::Entered {
            index,
            initializing: true,
        }
    }

    fn finish(&mut self, reason: ExitReason, target: Destination) -> Transition {
        self.entry += 1;
        self.state.is_initializing = false;
        wlog!(
            "Workflow '{}' {} at step {}, exiting to '{}'",
            self.config.workflow_id(),
            reason,
            self.state.current_index,
            target
        );
        self.finished = Some((reason, target.clone()));
        Transition::Exited { reason, target }
    }

    fn page_id(&self, index: usize) -> &str {
        self.config.pages().get(index).map_or("?", |p| p.id())
    }
}

fn ignored(reason: IgnoreReason) -> Transition {
    Transition::Ignored { reason }
}
