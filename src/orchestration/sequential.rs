//! Sequential strategy: one role after another, stop at the first failure

use super::invoke::Dispatcher;
use super::parallel::no_agent_for;
use crate::agent::AgentContext;
use crate::core::{AgentOutput, AgentType, CoordinationState, Task};

pub(crate) async fn run(
    dispatcher: &Dispatcher<'_>,
    task: &Task,
    pipeline: &[AgentType],
    state: &mut CoordinationState,
) {
    let mut last: Option<AgentOutput> = None;

    for (stage, role) in pipeline.iter().enumerate() {
        let Some(agent) = dispatcher.registry().find_best(*role) else {
            state.fail(no_agent_for(*role));
            return;
        };

        let mut context = AgentContext::default().with_prior_steps(&state.steps);
        if *role == AgentType::Reviewer {
            if let Some(prev) = &last {
                context = context.with_under_review(prev.clone());
            }
        }

        let invocation = match dispatcher.invoke(&agent, task, &context).await {
            Ok(invocation) => invocation,
            Err(exhausted) => {
                state.fail(exhausted.to_string());
                return;
            }
        };
        state.record_step(invocation.step);

        match invocation.outcome {
            Ok(output) => {
                tracing::info!("Stage {} '{}' completed by {}", stage + 1, role, agent.id());
                last = Some(output);
            }
            Err(e) => {
                state.fail(e.to_string());
                return;
            }
        }
    }

    match last {
        Some(output) => state.finish(output),
        None => state.fail("pipeline is empty"),
    }
}
