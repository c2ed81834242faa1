//! Automation tasks: UI, process, data, workflow and learning, with a fluent
//! builder, canned templates and a retrying executor.

mod builder;
mod executor;
mod task;
mod templates;
pub mod vision;

pub use builder::{
    AutomationBuilder, BuilderError, DataBuilder, LearningBuilder, ProcessBuilder, UiBuilder, WorkflowBuilder,
};
pub use executor::AutomationSystem;
pub use task::*;
pub use templates::WorkflowTemplates;
pub use vision::TextLocator;
