//! Core workflow type definitions.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

use super::page::PageDefinition;

/// Identifier of a workflow: selects its page set and its progress record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WorkflowId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("workflow id cannot be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for WorkflowId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Navigation request a page can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Next,
    Back,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Next => write!(f, "next"),
            Signal::Back => write!(f, "back"),
        }
    }
}

impl std::str::FromStr for Signal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "next" => Ok(Signal::Next),
            "back" => Ok(Signal::Back),
            other => Err(Error::Validation(format!("unknown signal '{}'", other))),
        }
    }
}

/// Where control goes when a workflow is left.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Destination(String);

impl Destination {
    pub fn new(route: impl Into<String>) -> Self {
        Self(route.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Destination {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Why a workflow handed control back to its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// `next` on the last page.
    Completed,
    /// `back` on the first page.
    Abandoned,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Completed => write!(f, "completed"),
            ExitReason::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Everything one engine run needs to know about its workflow.
#[derive(Debug, Clone)]
pub struct WorkflowConfiguration {
    workflow_id: WorkflowId,
    pages: Vec<PageDefinition>,
    exit_target: Destination,
    first_page_back_target: Option<Destination>,
    persistence_enabled: bool,
}

impl WorkflowConfiguration {
    /// Persistence is enabled by default.
    ///
    /// # Errors
    /// `Error::EmptyPageSet` when `pages` is empty, `Error::Validation` when
    /// two pages share an id.
    pub fn new(
        workflow_id: WorkflowId,
        pages: Vec<PageDefinition>,
        exit_target: Destination,
    ) -> Result<Self> {
        if pages.is_empty() {
            return Err(Error::EmptyPageSet(workflow_id.to_string()));
        }
        for (i, page) in pages.iter().enumerate() {
            if pages[..i].iter().any(|p| p.id() == page.id()) {
                return Err(Error::Validation(format!(
                    "duplicate page id '{}' in workflow '{}'",
                    page.id(),
                    workflow_id
                )));
            }
        }
        Ok(Self {
            workflow_id,
            pages,
            exit_target,
            first_page_back_target: None,
            persistence_enabled: true,
        })
    }

    pub fn with_first_page_back_target(mut self, target: Option<Destination>) -> Self {
        self.first_page_back_target = target;
        self
    }

    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.persistence_enabled = enabled;
        self
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    pub fn pages(&self) -> &[PageDefinition] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn exit_target(&self) -> &Destination {
        &self.exit_target
    }

    pub fn first_page_back_target(&self) -> Option<&Destination> {
        self.first_page_back_target.as_ref()
    }

    pub fn persistence_enabled(&self) -> bool {
        self.persistence_enabled
    }
}
