//! Coordinator: validates a run, dispatches it to a strategy, returns the
//! terminal state

use super::invoke::{Budget, Dispatcher};
use super::{feedback, hierarchical, parallel, sequential};
use crate::agent::AgentRegistry;
use crate::core::{
    AgentType, CoordinationError, CoordinationMode, CoordinationState, RunOptions, Task,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Instrument;

pub struct Coordinator {
    registry: Arc<AgentRegistry>,
    /// Sequential role order per task type
    pipelines: HashMap<String, Vec<AgentType>>,
}

impl Coordinator {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            pipelines: HashMap::new(),
        }
    }

    pub fn with_pipelines(mut self, pipelines: HashMap<String, Vec<AgentType>>) -> Self {
        self.pipelines = pipelines;
        self
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Run `task` under the strategy named by `mode`
    ///
    /// Only configuration problems are returned as errors. Agent failures and
    /// exhausted budgets end up in the returned state's `error`.
    pub async fn run(
        &self,
        task: Task,
        mode: &str,
        options: RunOptions,
    ) -> Result<CoordinationState, CoordinationError> {
        let mode: CoordinationMode = mode.parse()?;
        self.run_mode(task, mode, options).await
    }

    pub async fn run_mode(
        &self,
        task: Task,
        mode: CoordinationMode,
        options: RunOptions,
    ) -> Result<CoordinationState, CoordinationError> {
        let pipeline = self.pipeline_for(&task, &options);
        let missing = self
            .registry
            .missing_roles(&required_roles(mode, &pipeline, &options));
        if !missing.is_empty() {
            return Err(CoordinationError::UnsatisfiableStrategy { mode, missing });
        }

        let mut state = CoordinationState::new(task, mode);
        let span = tracing::info_span!("coordination", run_id = %state.run_id, mode = %mode);

        async {
            tracing::info!(task = %state.task.summary(), "Coordination started");

            let dispatcher = Dispatcher::new(
                &self.registry,
                Budget::new(options.max_iterations, options.time_budget),
                options.agent_timeout,
            );
            let task = state.task.clone();

            match mode {
                CoordinationMode::Sequential => {
                    sequential::run(&dispatcher, &task, &pipeline, &mut state).await
                }
                CoordinationMode::Parallel => {
                    parallel::run(&dispatcher, &task, &options.task_plan, &mut state).await
                }
                CoordinationMode::Hierarchical => {
                    hierarchical::run(&dispatcher, &task, &mut state).await
                }
                CoordinationMode::Feedback => {
                    feedback::run(&dispatcher, &task, options.max_feedback_rounds, &mut state)
                        .await
                }
            }

            match &state.error {
                None => tracing::info!(
                    steps = state.steps.len(),
                    failed_steps = state.failed_steps(),
                    invocations = dispatcher.invocations(),
                    "Coordination finished"
                ),
                Some(error) => tracing::warn!(
                    steps = state.steps.len(),
                    failed_steps = state.failed_steps(),
                    invocations = dispatcher.invocations(),
                    "Coordination failed: {}",
                    error
                ),
            }
        }
        .instrument(span)
        .await;

        Ok(state)
    }

    /// Role order for sequential mode: the run's override, then the configured
    /// pipeline for the task type, then the default
    pub fn pipeline_for(&self, task: &Task, options: &RunOptions) -> Vec<AgentType> {
        if let Some(pipeline) = &options.pipeline {
            return pipeline.clone();
        }
        task.task_type
            .as_ref()
            .and_then(|t| self.pipelines.get(t))
            .cloned()
            .unwrap_or_else(|| AgentType::DEFAULT_PIPELINE.to_vec())
    }
}

/// Roles a strategy cannot run without
fn required_roles(mode: CoordinationMode, pipeline: &[AgentType], options: &RunOptions) -> Vec<AgentType> {
    match mode {
        CoordinationMode::Sequential => pipeline.to_vec(),
        CoordinationMode::Parallel => options.task_plan.iter().map(|s| s.agent_type).collect(),
        CoordinationMode::Hierarchical => vec![AgentType::Planner],
        CoordinationMode::Feedback => vec![AgentType::Executor, AgentType::Reviewer],
    }
}
