//! Feedback-loop strategy: executor and reviewer alternate until the review
//! passes or the round limit is reached
//!
//! ```text
//!  Executing(r) --ok--> Reviewing(r) --pass--> Completed
//!       |                   |  \--reject, r < max--> Executing(r + 1)
//!       |                   |--reject, r == max--> Failed
//!       \--error--> Failed  \--error--> Failed
//! ```
//!
//! The round counter only grows on the `Reviewing -> Executing` edge and that
//! edge requires `r < max`, so at most `max` executor invocations happen.

use super::invoke::Dispatcher;
use super::parallel::no_agent_for;
use crate::agent::AgentContext;
use crate::core::{AgentOutput, AgentType, CoordinationState, Task};
use serde::Serialize;

pub(crate) const ROUNDS_EXCEEDED: &str = "max feedback rounds exceeded without passing review";

/// Observable phase of the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackPhase {
    Executing,
    Reviewing,
    Completed,
    Failed,
}

#[derive(Debug)]
enum Phase {
    Executing { round: u32 },
    Reviewing { round: u32, work: AgentOutput },
    Completed(AgentOutput),
    Failed(String),
}

impl Phase {
    fn label(&self) -> FeedbackPhase {
        match self {
            Phase::Executing { .. } => FeedbackPhase::Executing,
            Phase::Reviewing { .. } => FeedbackPhase::Reviewing,
            Phase::Completed(_) => FeedbackPhase::Completed,
            Phase::Failed(_) => FeedbackPhase::Failed,
        }
    }
}

pub(crate) async fn run(
    dispatcher: &Dispatcher<'_>,
    task: &Task,
    max_rounds: u32,
    state: &mut CoordinationState,
) {
    let mut critiques: Vec<String> = Vec::new();
    let mut phase = if max_rounds == 0 {
        Phase::Failed(ROUNDS_EXCEEDED.to_string())
    } else {
        Phase::Executing { round: 1 }
    };

    loop {
        tracing::debug!(phase = ?phase.label(), "Feedback loop transition");
        phase = match phase {
            Phase::Executing { round } => {
                execute(dispatcher, task, round, &critiques, state).await
            }
            Phase::Reviewing { round, work } => {
                let next = review(dispatcher, task, round, work, &mut critiques, state).await;
                match next {
                    Phase::Executing { round } if round > max_rounds => {
                        Phase::Failed(ROUNDS_EXCEEDED.to_string())
                    }
                    other => other,
                }
            }
            Phase::Completed(output) => {
                tracing::info!(rounds = state.feedback_rounds, "Review passed");
                state.finish(output);
                return;
            }
            Phase::Failed(error) => {
                state.fail(error);
                return;
            }
        };
    }
}

async fn execute(
    dispatcher: &Dispatcher<'_>,
    task: &Task,
    round: u32,
    critiques: &[String],
    state: &mut CoordinationState,
) -> Phase {
    let Some(executor) = dispatcher.registry().find_best(AgentType::Executor) else {
        return Phase::Failed(no_agent_for(AgentType::Executor));
    };

    let context = AgentContext::default()
        .with_prior_steps(&state.steps)
        .with_feedback(critiques.to_vec())
        .with_round(round);

    let invocation = match dispatcher.invoke(&executor, task, &context).await {
        Ok(invocation) => invocation,
        Err(exhausted) => return Phase::Failed(exhausted.to_string()),
    };
    state.feedback_rounds = round;
    state.record_step(invocation.step);

    match invocation.outcome {
        Ok(work) => Phase::Reviewing { round, work },
        Err(e) => Phase::Failed(e.to_string()),
    }
}

async fn review(
    dispatcher: &Dispatcher<'_>,
    task: &Task,
    round: u32,
    work: AgentOutput,
    critiques: &mut Vec<String>,
    state: &mut CoordinationState,
) -> Phase {
    let Some(reviewer) = dispatcher.registry().find_best(AgentType::Reviewer) else {
        return Phase::Failed(no_agent_for(AgentType::Reviewer));
    };

    let context = AgentContext::default()
        .with_feedback(critiques.clone())
        .with_under_review(work.clone())
        .with_round(round);

    let invocation = match dispatcher.invoke(&reviewer, task, &context).await {
        Ok(invocation) => invocation,
        Err(exhausted) => return Phase::Failed(exhausted.to_string()),
    };
    state.record_step(invocation.step);

    match invocation.outcome {
        Ok(verdict) if verdict.review_passed() => Phase::Completed(work),
        Ok(verdict) => {
            if let Some(critique) = verdict.critique() {
                critiques.push(critique);
            }
            tracing::info!(round, "Review rejected the work");
            Phase::Executing { round: round + 1 }
        }
        Err(e) => Phase::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentRegistry, ScriptStep, ScriptedAgent};
    use crate::core::{CoordinationMode, ResultKind};
    use crate::orchestration::invoke::Budget;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup(
        executor: ScriptedAgent,
        reviewer: ScriptedAgent,
    ) -> (AgentRegistry, Arc<ScriptedAgent>, Arc<ScriptedAgent>) {
        let registry = AgentRegistry::new();
        let executor = Arc::new(executor);
        let reviewer = Arc::new(reviewer);
        registry.register(executor.clone()).unwrap();
        registry.register(reviewer.clone()).unwrap();
        (registry, executor, reviewer)
    }

    #[tokio::test]
    async fn critique_reaches_next_round() {
        let (registry, executor, _) = setup(
            ScriptedAgent::new("x", AgentType::Executor)
                .then(ScriptStep::text(ResultKind::Execution, "v1"))
                .then(ScriptStep::text(ResultKind::Execution, "v2")),
            ScriptedAgent::new("r", AgentType::Reviewer)
                .then(ScriptStep::review(false, "cite sources"))
                .then(ScriptStep::review(true, "good")),
        );
        let dispatcher = Dispatcher::new(&registry, Budget::new(10, None), Duration::from_secs(5));
        let task = Task::new("essay");
        let mut state = CoordinationState::new(task.clone(), CoordinationMode::Feedback);
        run(&dispatcher, &task, 3, &mut state).await;

        assert!(state.is_success());
        assert_eq!(state.feedback_rounds, 2);

        let calls = executor.invocations();
        assert!(calls[0].1.feedback.is_empty());
        assert_eq!(calls[1].1.latest_feedback(), Some("cite sources"));
        assert_eq!(calls[1].1.round, 2);
    }

    #[tokio::test]
    async fn executor_failure_stops_loop() {
        let (registry, _, reviewer) = setup(
            ScriptedAgent::new("x", AgentType::Executor).then(ScriptStep::fail("out of memory")),
            ScriptedAgent::new("r", AgentType::Reviewer),
        );
        let dispatcher = Dispatcher::new(&registry, Budget::new(10, None), Duration::from_secs(5));
        let task = Task::new("t");
        let mut state = CoordinationState::new(task.clone(), CoordinationMode::Feedback);
        run(&dispatcher, &task, 3, &mut state).await;

        assert_eq!(state.error.as_deref(), Some("x failed: out of memory"));
        assert_eq!(reviewer.calls(), 0);
    }

    #[tokio::test]
    async fn reviewer_failure_fails_run() {
        let (registry, executor, _) = setup(
            ScriptedAgent::new("x", AgentType::Executor),
            ScriptedAgent::new("r", AgentType::Reviewer).then(ScriptStep::fail("model offline")),
        );
        let dispatcher = Dispatcher::new(&registry, Budget::new(10, None), Duration::from_secs(5));
        let task = Task::new("t");
        let mut state = CoordinationState::new(task.clone(), CoordinationMode::Feedback);
        run(&dispatcher, &task, 3, &mut state).await;

        assert_eq!(state.error.as_deref(), Some("r failed: model offline"));
        assert_eq!(executor.calls(), 1);
        assert_eq!(state.steps.len(), 2);
    }

    #[tokio::test]
    async fn zero_rounds_fails_without_steps() {
        let (registry, _, _) = setup(
            ScriptedAgent::new("x", AgentType::Executor),
            ScriptedAgent::new("r", AgentType::Reviewer),
        );
        let dispatcher = Dispatcher::new(&registry, Budget::new(10, None), Duration::from_secs(5));
        let task = Task::new("t");
        let mut state = CoordinationState::new(task.clone(), CoordinationMode::Feedback);
        run(&dispatcher, &task, 0, &mut state).await;

        assert_eq!(state.error.as_deref(), Some(ROUNDS_EXCEEDED));
        assert!(state.steps.is_empty());
    }

    #[tokio::test]
    async fn missing_verdict_counts_as_rejection() {
        let (registry, executor, _) = setup(
            ScriptedAgent::new("x", AgentType::Executor),
            ScriptedAgent::new("r", AgentType::Reviewer).then(ScriptStep::Reply(
                AgentOutput::new(ResultKind::Review, serde_json::json!({ "text": "hmm" })),
            )),
        );
        let dispatcher = Dispatcher::new(&registry, Budget::new(10, None), Duration::from_secs(5));
        let task = Task::new("t");
        let mut state = CoordinationState::new(task.clone(), CoordinationMode::Feedback);
        run(&dispatcher, &task, 2, &mut state).await;

        assert_eq!(state.error.as_deref(), Some(ROUNDS_EXCEEDED));
        assert_eq!(executor.calls(), 2);
    }
}
