//! Core domain modules
//!
//! Task/result model, coordination state and the error taxonomy shared by the
//! registry, the strategy executors and the transport layer.

pub mod errors;
pub mod types;

pub use errors::{AgentExecutionError, AgentFailure, CoordinationError};
pub use types::{
    AgentOutput, AgentStatus, AgentType, CoordinationMode, CoordinationState, ResultKind,
    RunOptions, StepRecord, Subtask, Task,
};
