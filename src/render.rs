use std::sync::atomic::{AtomicU64, Ordering};

use crate::workflow::{PageView, Signal};

static VERSION_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn next_version() -> u64 {
    VERSION_COUNTER.fetch_add(1, Ordering::Relaxed)
}

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// Displayed in red with an "Error:" prefix
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }
}

/// A page action as the render thread sees it: no trigger, just what to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionView {
    pub key: char,
    pub label: String,
    pub enabled: bool,
    pub signal: Signal,
}

/// Render-thread copy of a `PageView`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    pub title: String,
    pub body: Vec<String>,
    pub actions: Vec<ActionView>,
}

impl From<&PageView> for PageSnapshot {
    fn from(view: &PageView) -> Self {
        Self {
            title: view.title.clone(),
            body: view.body.clone(),
            actions: view
                .actions
                .iter()
                .map(|a| ActionView {
                    key: a.key,
                    label: a.label.clone(),
                    enabled: a.enabled,
                    signal: a.signal(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderState {
    pub version: u64,
    pub workflow_id: String,
    pub page_set: String,
    pub page_id: String,
    pub index: usize,
    pub total: usize,
    pub is_initializing: bool,
    pub persistence_enabled: bool,
    pub page: Option<PageSnapshot>,
    pub notification: Option<Notification>,
    pub tick: usize,
}

impl RenderState {
    /// Share of steps before the current one, 0-100.
    pub fn progress_percentage(&self) -> u16 {
        if self.total == 0 {
            return 0;
        }
        ((self.index.min(self.total) * 100) / self.total) as u16
    }

    pub fn step_label(&self) -> String {
        format!("Step {} of {}", (self.index + 1).min(self.total.max(1)), self.total)
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER[self.tick % SPINNER.len()]
    }
}
