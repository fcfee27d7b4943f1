//! Domain error types
//!
//! Configuration errors (`CoordinationError`) propagate out of
//! `Coordinator::run`. Agent failures (`AgentExecutionError`) are always caught
//! by the strategy executors and recorded on the coordination state.

use crate::core::types::{AgentType, CoordinationMode};
use crate::llm::LlmError;
use std::time::Duration;
use thiserror::Error;

/// Configuration and programmer errors raised to the caller of `run`
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// No agent registered under this id
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// An agent with this id is already registered
    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    /// The registry cannot supply every role the strategy needs
    #[error("Strategy {} is unsatisfiable: no agent registered for {}", .mode, join_roles(.missing))]
    UnsatisfiableStrategy {
        mode: CoordinationMode,
        missing: Vec<AgentType>,
    },

    /// Coordination mode string did not name a known strategy
    #[error("Unknown coordination mode: {0} (expected sequential, parallel, hierarchical or feedback)")]
    UnknownMode(String),
}

fn join_roles(roles: &[AgentType]) -> String {
    roles
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why a single agent invocation failed
#[derive(Debug, Error)]
pub enum AgentFailure {
    /// The call did not finish within the per-call timeout
    #[error("timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The language model call failed
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// The agent produced output it could not turn into a result
    #[error("invalid output: {0}")]
    InvalidOutput(String),

    /// The agent panicked
    #[error("agent crashed: {0}")]
    Panicked(String),

    /// Any other agent-reported failure
    #[error("{0}")]
    Failed(String),
}

/// Runtime failure of one agent invocation
#[derive(Debug, Error)]
#[error("{agent_id} failed: {cause}")]
pub struct AgentExecutionError {
    pub agent_id: String,
    #[source]
    pub cause: AgentFailure,
}

impl AgentExecutionError {
    pub fn new(agent_id: impl Into<String>, cause: AgentFailure) -> Self {
        Self {
            agent_id: agent_id.into(),
            cause,
        }
    }

    /// Failure with a free-form message
    pub fn failed(agent_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(agent_id, AgentFailure::Failed(message.into()))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, AgentFailure::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsatisfiable_lists_missing_roles() {
        let err = CoordinationError::UnsatisfiableStrategy {
            mode: CoordinationMode::Feedback,
            missing: vec![AgentType::Executor, AgentType::Reviewer],
        };
        assert_eq!(
            err.to_string(),
            "Strategy feedback is unsatisfiable: no agent registered for executor, reviewer"
        );
    }

    #[test]
    fn execution_error_display_names_agent() {
        let err = AgentExecutionError::new(
            "executor_001",
            AgentFailure::Timeout(Duration::from_millis(1500)),
        );
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "executor_001 failed: timed out after 1.5s");
    }

    #[test]
    fn llm_errors_convert_into_failures() {
        let cause: AgentFailure = LlmError::RateLimited("slow down".into()).into();
        assert_eq!(cause.to_string(), "Rate limited: slow down");
    }
}
