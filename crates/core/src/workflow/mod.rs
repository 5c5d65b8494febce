//! Workflow orchestration for the active transaction session.

mod engine;
mod error;

pub use engine::{EngineStatus, WorkflowEngine};
pub use error::WorkflowError;
