use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

use crate::actors::{ActorHandle, Tick, TickActor};
use crate::host::{RouteParams, WorkflowHost, WorkflowRun};
use crate::progress::KvStore;
use crate::render::{next_version, Notification, PageSnapshot, RenderState};
use crate::workflow::{Destination, Transition, WorkflowEngine};
use crate::{wlog, wlog_debug, wlog_error, Result};

const MAX_ENGINE_MESSAGES: usize = 50;

const INIT_FAILED_NOTICE: &str = "This step could not load its data. You can still continue.";

/// How a TUI run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppExit {
    /// The user quit; the workflow keeps its progress.
    Quit,
    /// The workflow exited to this destination.
    Navigate(Destination),
}

/// What a key press means before the page is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyIntent {
    Quit,
    Action(char),
    Ignore,
}

fn key_intent(key: KeyEvent) -> KeyIntent {
    if key.kind != KeyEventKind::Press {
        return KeyIntent::Ignore;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyIntent::Quit,
        KeyCode::Char('q') | KeyCode::Esc => KeyIntent::Quit,
        KeyCode::Char(c) => KeyIntent::Action(c.to_ascii_lowercase()),
        KeyCode::Enter | KeyCode::Right => KeyIntent::Action('n'),
        KeyCode::Left | KeyCode::Backspace => KeyIntent::Action('b'),
        _ => KeyIntent::Ignore,
    }
}

/// UI-only state that lives next to the engine.
#[derive(Debug, Default)]
struct Overlay {
    page_set: String,
    notification: Option<Notification>,
    tick: usize,
}

pub struct LogicThread;

impl LogicThread {
    pub fn run<S: KvStore + 'static>(
        host: Arc<WorkflowHost<S>>,
        params: RouteParams,
        state_tx: Sender<RenderState>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<AppExit> {
        Runtime::new()?.block_on(Self::run_async(host, params, state_tx, shutdown))
    }

    async fn run_async<S: KvStore + 'static>(
        host: Arc<WorkflowHost<S>>,
        params: RouteParams,
        state_tx: Sender<RenderState>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<AppExit> {
        wlog_debug!("LogicThread::run_async workflow={}", params.workflow_id);
        let WorkflowRun {
            mut engine,
            page_set,
            ..
        } = host.engine(&params)?;
        let mut overlay = Overlay {
            page_set: page_set.to_string(),
            ..Overlay::default()
        };

        let (tick_tx, mut tick_rx) = mpsc::unbounded_channel::<Tick>();
        let ticker = TickActor::new(tick_tx).spawn();

        engine.start().await;
        send_state(&state_tx, &engine, &overlay);

        loop {
            if shutdown.load(Ordering::Relaxed) {
                return Ok(quit(&ticker));
            }
            let mut dirty = false;

            // Keyboard input (priority)
            while event::poll(Duration::ZERO)? {
                let Event::Key(key) = event::read()? else {
                    continue;
                };
                match key_intent(key) {
                    KeyIntent::Quit => {
                        wlog!("Quit requested at step {}", engine.state().current_index);
                        return Ok(quit(&ticker));
                    }
                    KeyIntent::Action(c) => {
                        overlay.notification = None;
                        dispatch_key(&engine, c);
                        dirty = true;
                    }
                    KeyIntent::Ignore => {}
                }
            }

            // Engine messages (bounded)
            for _ in 0..MAX_ENGINE_MESSAGES {
                let Some(msg) = engine.try_recv() else { break };
                match engine.handle(msg).await {
                    Ok(Transition::Exited { target, .. }) => {
                        ticker.shutdown();
                        return Ok(AppExit::Navigate(target));
                    }
                    Ok(Transition::Ignored { .. }) => {}
                    Ok(transition) => {
                        if let Some(notification) = notification_for(&transition) {
                            overlay.notification = Some(notification);
                        }
                        dirty = true;
                    }
                    Err(e) => {
                        wlog_error!("Transition failed: {}", e);
                        overlay.notification = Some(Notification::error(e.to_string()));
                        dirty = true;
                    }
                }
            }

            while let Ok(Tick(n)) = tick_rx.try_recv() {
                if engine.state().is_initializing {
                    overlay.tick = n as usize;
                    dirty = true;
                }
            }

            if dirty {
                send_state(&state_tx, &engine, &overlay);
            }

            tokio::time::sleep(Duration::from_micros(500)).await;
        }
    }
}

/// Non-fatal outcomes the user should hear about.
fn notification_for(transition: &Transition) -> Option<Notification> {
    match transition {
        Transition::Ready {
            init_failed: true, ..
        } => Some(Notification::info(INIT_FAILED_NOTICE)),
        _ => None,
    }
}

fn quit(ticker: &ActorHandle) -> AppExit {
    ticker.shutdown();
    AppExit::Quit
}

/// Fire the enabled page action bound to `key`, if any.
fn dispatch_key<S: KvStore>(engine: &WorkflowEngine<S>, key: char) -> bool {
    let Some(view) = engine.render() else {
        return false;
    };
    match view.find_action(key) {
        Some(action) => {
            let fired = action.fire();
            wlog_debug!("Key '{}' -> {} (fired={})", key, action.signal(), fired);
            fired
        }
        None => false,
    }
}

fn snapshot<S: KvStore>(engine: &WorkflowEngine<S>, overlay: &Overlay) -> RenderState {
    let config = engine.config();
    let state = engine.state();
    RenderState {
        version: next_version(),
        workflow_id: config.workflow_id().to_string(),
        page_set: overlay.page_set.clone(),
        page_id: engine
            .current_page()
            .map(|p| p.id().to_string())
            .unwrap_or_default(),
        index: state.current_index,
        total: engine.page_count(),
        is_initializing: state.is_initializing,
        persistence_enabled: config.persistence_enabled(),
        page: engine.render().as_ref().map(PageSnapshot::from),
        notification: overlay.notification.clone(),
        tick: overlay.tick,
    }
}

fn send_state<S: KvStore>(state_tx: &Sender<RenderState>, engine: &WorkflowEngine<S>, overlay: &Overlay) {
    let _ = state_tx.try_send(snapshot(engine, overlay));
}
