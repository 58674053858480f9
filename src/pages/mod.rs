//! Built-in page sets.
//!
//! A page set is a named constructor from the run's `WorkflowContext` to an
//! ordered list of pages. Lookup is by exact name only.

mod demo;
mod seller_onboarding;

use crate::workflow::{PageDefinition, WorkflowContext};

pub const DEMO: &str = "demo";
pub const SELLER_ONBOARDING: &str = "seller-onboarding";

/// Set used for unknown workflow ids.
pub const DEFAULT_SET: &str = DEMO;

type Builder = fn(&WorkflowContext) -> Vec<PageDefinition>;

const REGISTRY: &[(&str, Builder)] = &[
    (DEMO, demo::pages as Builder),
    (SELLER_ONBOARDING, seller_onboarding::pages as Builder),
];

/// Names of every registered set, in registration order.
pub fn names() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

/// Build the pages of `name`, or `None` when no set has that exact name.
pub fn build(name: &str, ctx: &WorkflowContext) -> Option<Vec<PageDefinition>> {
    REGISTRY
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, builder)| builder(ctx))
}
