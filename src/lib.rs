//! crewline: multi-agent coordination engine
//!
//! This library provides:
//! - A registry of analyst, planner, executor, reviewer and researcher agents
//! - Sequential, parallel, hierarchical and feedback-loop coordination
//! - LLM-backed role agents over an OpenAI-compatible client or an offline simulator
//! - An HTTP API for submitting tasks

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod orchestration;
pub mod transport;

pub use agent::{Agent, AgentContext, AgentDescriptor, AgentRegistry, Capability};
pub use config::Config;
pub use core::{
    AgentExecutionError, AgentFailure, AgentOutput, AgentStatus, AgentType, CoordinationError,
    CoordinationMode, CoordinationState, ResultKind, RunOptions, StepRecord, Subtask, Task,
};
pub use orchestration::Coordinator;

use std::sync::Arc;

/// Coordinator over the default roster, wired from configuration
pub fn build_coordinator(config: &Config) -> anyhow::Result<Coordinator> {
    let llm = llm::create_client(&config.llm)?;
    tracing::info!(provider = llm.name(), model = llm.model(), "LLM client ready");
    let registry =
        AgentRegistry::with_default_roster_options(llm, config.llm.generate_options());
    Ok(Coordinator::new(Arc::new(registry)).with_pipelines(config.pipelines()))
}
