//! Page definitions and the contract between pages and the engine.
//!
//! A page is a record of plain capabilities: an id, a render function and an
//! optional async initializer. Pages never touch engine state; the only way
//! they can ask for a transition is through the `Emitter` in their props.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;

use super::engine::EngineMessage;
use super::types::Signal;
use crate::Result;

/// Async readiness work run once per step-entry.
pub type Initializer = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Pure function of the current props to a view.
pub type Renderer = Arc<dyn Fn(&PageProps) -> PageView + Send + Sync>;

/// One step of a workflow.
#[derive(Clone)]
pub struct PageDefinition {
    id: String,
    render: Renderer,
    initialize: Option<Initializer>,
}

impl PageDefinition {
    pub fn new<R>(id: impl Into<String>, render: R) -> Self
    where
        R: Fn(&PageProps) -> PageView + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            render: Arc::new(render),
            initialize: None,
        }
    }

    /// Attach an initializer. Each call of `init` must start fresh work.
    pub fn with_initializer<F, Fut>(mut self, init: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.initialize = Some(Arc::new(move || init().boxed()));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn has_initializer(&self) -> bool {
        self.initialize.is_some()
    }

    pub fn render(&self, props: &PageProps) -> PageView {
        (self.render)(props)
    }

    pub(crate) fn initializer(&self) -> Option<Initializer> {
        self.initialize.clone()
    }
}

impl std::fmt::Debug for PageDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageDefinition")
            .field("id", &self.id)
            .field("has_initializer", &self.has_initializer())
            .finish()
    }
}

/// What a page receives when rendered.
#[derive(Debug, Clone)]
pub struct PageProps {
    pub emit: Emitter,
    pub is_initializing: bool,
}

/// Sends navigation signals to the engine, tagged with the step-entry the
/// emitter was created for. Signals from a superseded entry are ignored.
#[derive(Debug, Clone)]
pub struct Emitter {
    entry: u64,
    tx: mpsc::UnboundedSender<EngineMessage>,
}

impl Emitter {
    pub(crate) fn new(entry: u64, tx: mpsc::UnboundedSender<EngineMessage>) -> Self {
        Self { entry, tx }
    }

    /// An emitter connected to nothing; signals are dropped.
    pub fn detached() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { entry: 0, tx }
    }

    pub fn entry(&self) -> u64 {
        self.entry
    }

    pub fn emit(&self, signal: Signal) {
        let _ = self.tx.send(EngineMessage::Signal {
            entry: self.entry,
            signal,
        });
    }

    pub fn next(&self) {
        self.emit(Signal::Next);
    }

    pub fn back(&self) {
        self.emit(Signal::Back);
    }

    /// Bind this emitter to a fixed signal, for use in a `PageAction`.
    pub fn trigger(&self, signal: Signal) -> Trigger {
        Trigger {
            emitter: self.clone(),
            signal,
        }
    }
}

/// A deferred `emit(signal)`.
#[derive(Debug, Clone)]
pub struct Trigger {
    emitter: Emitter,
    signal: Signal,
}

impl Trigger {
    pub fn signal(&self) -> Signal {
        self.signal
    }

    pub fn fire(&self) {
        self.emitter.emit(self.signal);
    }
}

/// A key the page reacts to.
#[derive(Debug, Clone)]
pub struct PageAction {
    pub key: char,
    pub label: String,
    pub enabled: bool,
    trigger: Trigger,
}

impl PageAction {
    pub fn new(key: char, label: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            key,
            label: label.into(),
            enabled: true,
            trigger,
        }
    }

    pub fn disabled_if(mut self, disabled: bool) -> Self {
        self.enabled = !disabled;
        self
    }

    pub fn signal(&self) -> Signal {
        self.trigger.signal()
    }

    /// Fire the trigger. Returns false (and does nothing) when disabled.
    pub fn fire(&self) -> bool {
        if self.enabled {
            self.trigger.fire();
        }
        self.enabled
    }
}

/// Displayable unit produced by a page.
#[derive(Debug, Clone, Default)]
pub struct PageView {
    pub title: String,
    pub body: Vec<String>,
    pub actions: Vec<PageAction>,
}

impl PageView {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.body.push(line.into());
        self
    }

    pub fn blank(self) -> Self {
        self.line("")
    }

    pub fn action(mut self, action: PageAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn find_action(&self, key: char) -> Option<&PageAction> {
        self.actions.iter().find(|a| a.key == key)
    }

    /// Standard back/next pair, both disabled while the page initializes.
    pub fn with_nav(self, props: &PageProps, next_label: &str) -> Self {
        self.action(
            PageAction::new('b', "back", props.emit.trigger(Signal::Back))
                .disabled_if(props.is_initializing),
        )
        .action(
            PageAction::new('n', next_label, props.emit.trigger(Signal::Next))
                .disabled_if(props.is_initializing),
        )
    }
}
