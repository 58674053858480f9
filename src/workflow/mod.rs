//! Paginated workflows: page contract, configuration and the step engine.

mod context;
mod engine;
mod page;
mod types;

pub use context::WorkflowContext;
pub use engine::{
    AdvanceHook, EngineMessage, EngineState, IgnoreReason, Transition, WorkflowEngine,
};
pub use page::{Emitter, Initializer, PageAction, PageDefinition, PageProps, PageView, Trigger};
pub use types::{Destination, ExitReason, Signal, WorkflowConfiguration, WorkflowId};
