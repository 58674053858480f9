//! Workflow host: turns a route into a configured engine.
//!
//! Routes look like `workflow/<id>?exitTo=<dest>&persist=false&firstBackTo=<dest>`.
//! Anything that is not a workflow route is a plain screen destination that
//! the binary only reports.

use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use percent_encoding::percent_decode_str;
use regex::Regex;
use url::form_urlencoded;

use crate::config::Config;
use crate::pages;
use crate::progress::{KvStore, ProgressStore};
use crate::workflow::{
    Destination, PageDefinition, WorkflowConfiguration, WorkflowContext, WorkflowEngine,
    WorkflowId,
};
use crate::{wlog, wlog_debug, wlog_warn, Error, Result};

/// `persist` value that turns persistence off. Every other value leaves it on.
pub const DISABLE_PERSISTENCE: &str = "false";

static WORKFLOW_ROUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/?workflow/([^?]*)(?:\?(.*))?$").expect("workflow route regex is valid")
});

/// Options carried by a workflow route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteParams {
    pub workflow_id: WorkflowId,
    pub exit_to: Option<Destination>,
    pub persist: Option<String>,
    pub first_back_to: Option<Destination>,
}

impl RouteParams {
    pub fn new(workflow_id: WorkflowId) -> Self {
        Self {
            workflow_id,
            exit_to: None,
            persist: None,
            first_back_to: None,
        }
    }

    pub fn persistence_enabled(&self) -> bool {
        self.persist.as_deref() != Some(DISABLE_PERSISTENCE)
    }

    fn apply_query(&mut self, query: &str) {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "exitTo" if !value.is_empty() => {
                    self.exit_to = Some(Destination::new(value.into_owned()))
                }
                "firstBackTo" if !value.is_empty() => {
                    self.first_back_to = Some(Destination::new(value.into_owned()))
                }
                "persist" => self.persist = Some(value.into_owned()),
                other => wlog_debug!("Ignoring route parameter '{}'", other),
            }
        }
    }
}

/// A parsed destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Workflow(RouteParams),
    Screen(Destination),
}

impl FromStr for Route {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let route = s.trim();
        if let Some(caps) = WORKFLOW_ROUTE.captures(route) {
            let raw_id = caps.get(1).map_or("", |m| m.as_str());
            let id = percent_decode_str(raw_id).decode_utf8_lossy();
            let id = id.trim_end_matches('/');
            if id.trim().is_empty() {
                return Err(Error::InvalidRoute(format!("'{}' names no workflow", route)));
            }
            let mut params = RouteParams::new(WorkflowId::new(id.trim()));
            if let Some(query) = caps.get(2) {
                params.apply_query(query.as_str());
            }
            return Ok(Route::Workflow(params));
        }

        let screen = route.trim_start_matches('/');
        if screen.is_empty() {
            return Err(Error::InvalidRoute("empty route".to_string()));
        }
        Ok(Route::Screen(Destination::new(screen)))
    }
}

/// One resolved run: the engine plus what the runtime shows about it.
pub struct WorkflowRun<S> {
    pub engine: WorkflowEngine<S>,
    pub context: WorkflowContext,
    pub page_set: &'static str,
}

/// Owns the progress store and configuration shared by every run.
pub struct WorkflowHost<S> {
    progress: Arc<ProgressStore<S>>,
    config: Config,
}

impl<S: KvStore + 'static> WorkflowHost<S> {
    pub fn new(progress: Arc<ProgressStore<S>>, config: Config) -> Self {
        Self { progress, config }
    }

    pub fn progress(&self) -> &Arc<ProgressStore<S>> {
        &self.progress
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Exact-name lookup; unknown ids get the default set.
    pub fn resolve_page_set(
        &self,
        workflow_id: &WorkflowId,
        ctx: &WorkflowContext,
    ) -> (&'static str, Vec<PageDefinition>) {
        for name in pages::names() {
            if name == workflow_id.as_str() {
                if let Some(set) = pages::build(name, ctx) {
                    return (name, set);
                }
            }
        }
        wlog_warn!(
            "Unknown workflow '{}', using the '{}' page set",
            workflow_id,
            pages::DEFAULT_SET
        );
        (
            pages::DEFAULT_SET,
            pages::build(pages::DEFAULT_SET, ctx).unwrap_or_default(),
        )
    }

    pub fn configure(
        &self,
        params: &RouteParams,
        ctx: &WorkflowContext,
    ) -> Result<(&'static str, WorkflowConfiguration)> {
        let (page_set, pages) = self.resolve_page_set(&params.workflow_id, ctx);
        let exit = params
            .exit_to
            .clone()
            .unwrap_or_else(|| Destination::new(self.config.effective_exit()));
        let config = WorkflowConfiguration::new(params.workflow_id.clone(), pages, exit)?
            .with_first_page_back_target(params.first_back_to.clone())
            .with_persistence(params.persistence_enabled());
        Ok((page_set, config))
    }

    /// Build an engine for `params` with the host's advance hook installed.
    /// The engine is not started.
    pub fn engine(&self, params: &RouteParams) -> Result<WorkflowRun<S>> {
        let context = WorkflowContext::new();
        let (page_set, config) = self.configure(params, &context)?;
        wlog_debug!(
            "Route resolved: workflow={} set={} exit={} first_back={:?} persist={}",
            params.workflow_id,
            page_set,
            config.exit_target(),
            config.first_page_back_target(),
            config.persistence_enabled()
        );

        let progress = Arc::clone(&self.progress);
        let workflow_id = params.workflow_id.clone();
        let clear = self.config.clear_on_complete && config.persistence_enabled();
        let len = config.page_count();

        let engine = WorkflowEngine::new(config, Arc::clone(&self.progress))
            .with_init_timeout(self.config.init_timeout())
            .with_advance_hook(move |from, to| {
                let progress = Arc::clone(&progress);
                let workflow_id = workflow_id.clone();
                async move {
                    wlog!("'{}' advanced {} -> {}", workflow_id, from, to);
                    if clear && to == len {
                        progress.clear_progress(&workflow_id).await?;
                    }
                    Ok(())
                }
            });

        Ok(WorkflowRun {
            engine,
            context,
            page_set,
        })
    }
}
