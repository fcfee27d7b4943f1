//! Hierarchical strategy: a planner decomposes, workers execute
//!
//! Subtasks without a dependency run as one parallel batch. Dependent subtasks
//! follow one at a time in index order, each seeing its dependency's output.

use super::aggregate::{self, BranchEntry};
use super::invoke::Dispatcher;
use super::parallel::{self, Branch, RoundRobin, ALL_FAILED};
use crate::agent::AgentContext;
use crate::core::{AgentOutput, AgentType, CoordinationState, Subtask, Task};

/// Read and check the subtask list carried by a plan output
fn decompose(plan: &AgentOutput) -> Result<Vec<Subtask>, String> {
    let raw = plan
        .payload
        .get("subtasks")
        .cloned()
        .ok_or_else(|| "plan has no subtask list".to_string())?;
    let subtasks: Vec<Subtask> =
        serde_json::from_value(raw).map_err(|e| format!("invalid subtask list: {}", e))?;

    for (index, subtask) in subtasks.iter().enumerate() {
        if let Some(dep) = subtask.depends_on {
            if dep >= index {
                return Err(format!(
                    "subtask {} depends on {}, which is not an earlier subtask",
                    index, dep
                ));
            }
        }
    }
    Ok(subtasks)
}

pub(crate) async fn run(dispatcher: &Dispatcher<'_>, task: &Task, state: &mut CoordinationState) {
    let Some(planner) = dispatcher.registry().find_best(AgentType::Planner) else {
        state.fail(format!(
            "task decomposition failed: {}",
            parallel::no_agent_for(AgentType::Planner)
        ));
        return;
    };

    let invocation = match dispatcher
        .invoke(&planner, task, &AgentContext::default())
        .await
    {
        Ok(invocation) => invocation,
        Err(exhausted) => {
            state.fail(exhausted.to_string());
            return;
        }
    };
    state.record_step(invocation.step);

    let decomposed = invocation
        .outcome
        .map_err(|e| e.to_string())
        .and_then(|plan| decompose(&plan));
    let subtasks = match decomposed {
        Ok(subtasks) if subtasks.is_empty() => {
            state.fail("task decomposition returned no subtasks");
            return;
        }
        Ok(subtasks) => subtasks,
        Err(cause) => {
            state.fail(format!("task decomposition failed: {}", cause));
            return;
        }
    };
    state.task_plan = subtasks.clone();
    tracing::info!(
        subtasks = subtasks.len(),
        planner = %planner.id(),
        "Task decomposed"
    );

    let mut round_robin = RoundRobin::new();
    let planner_steps = state.steps.clone();

    let independent: Vec<Branch> = subtasks
        .iter()
        .enumerate()
        .filter(|(_, s)| s.depends_on.is_none())
        .map(|(index, subtask)| Branch {
            index,
            subtask: subtask.clone(),
            agent: round_robin.assign(dispatcher, subtask.agent_type),
            context: AgentContext::default().with_prior_steps(&planner_steps),
        })
        .collect();

    let batch = parallel::run_batch(dispatcher, task, independent, state).await;
    if let Some(reason) = batch.exhausted {
        state.fail(reason.to_string());
        return;
    }

    let mut entries: Vec<Option<BranchEntry>> = vec![None; subtasks.len()];
    for entry in batch.entries {
        let index = entry.index;
        entries[index] = Some(entry);
    }

    for (index, subtask) in subtasks.iter().enumerate() {
        let Some(dep) = subtask.depends_on else {
            continue;
        };
        let role = subtask.agent_type;

        let dep_output = entries[dep]
            .as_ref()
            .filter(|e| e.is_success())
            .and_then(|e| e.output.clone());
        let Some(dep_output) = dep_output else {
            tracing::debug!(index, dep, "Skipping subtask, dependency did not succeed");
            entries[index] = Some(BranchEntry::skipped(
                index,
                role,
                format!("dependency {} did not succeed", dep),
            ));
            continue;
        };

        let Some(agent) = round_robin.assign(dispatcher, role) else {
            entries[index] = Some(BranchEntry::failed(
                index,
                role,
                None,
                parallel::no_agent_for(role),
            ));
            continue;
        };

        let context = AgentContext::default()
            .with_prior_steps(&state.steps)
            .with_dependency(dep_output);
        let invocation = match dispatcher
            .invoke(&agent, &task.for_subtask(subtask), &context)
            .await
        {
            Ok(invocation) => invocation,
            Err(exhausted) => {
                state.fail(exhausted.to_string());
                return;
            }
        };
        let agent_id = invocation.step.agent_id.clone();
        state.record_step(invocation.step);
        entries[index] = Some(match invocation.outcome {
            Ok(output) => BranchEntry::succeeded(index, role, agent_id, output),
            Err(e) => BranchEntry::failed(index, role, Some(agent_id), e.to_string()),
        });
    }

    let entries: Vec<BranchEntry> = entries.into_iter().flatten().collect();
    if aggregate::none_succeeded(&entries) {
        state.fail(ALL_FAILED);
    } else {
        state.finish(aggregate::merge(entries));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ResultKind;
    use serde_json::json;

    fn plan(subtasks: serde_json::Value) -> AgentOutput {
        AgentOutput::new(ResultKind::Plan, json!({ "subtasks": subtasks }))
    }

    #[test]
    fn forward_dependency_is_rejected() {
        let out = plan(json!([
            { "description": "a", "agent_type": "executor", "depends_on": 1 },
            { "description": "b", "agent_type": "executor" }
        ]));
        let err = decompose(&out).unwrap_err();
        assert!(err.contains("not an earlier subtask"));
    }

    #[test]
    fn self_dependency_is_rejected() {
        let out = plan(json!([{ "description": "a", "agent_type": "executor", "depends_on": 0 }]));
        assert!(decompose(&out).is_err());
    }

    #[test]
    fn text_only_plan_has_no_subtasks() {
        let out = AgentOutput::text(ResultKind::Plan, "do things");
        assert_eq!(decompose(&out).unwrap_err(), "plan has no subtask list");
    }

    #[test]
    fn unknown_role_is_invalid() {
        let out = plan(json!([{ "description": "a", "agent_type": "wizard" }]));
        assert!(decompose(&out).unwrap_err().starts_with("invalid subtask list"));
    }
}
