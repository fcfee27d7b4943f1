//! Parallel strategy: fan out independent subtasks, join at a barrier

use super::aggregate::{self, BranchEntry};
use super::invoke::{BudgetExhausted, Dispatcher};
use crate::agent::{Agent, AgentContext};
use crate::core::{AgentType, CoordinationState, Subtask, Task};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) const ALL_FAILED: &str = "all parallel branches failed";

/// One subtask ready to dispatch
pub(crate) struct Branch {
    pub index: usize,
    pub subtask: Subtask,
    /// `None` when no agent of the role is registered
    pub agent: Option<Arc<dyn Agent>>,
    pub context: AgentContext,
}

pub(crate) struct BatchResult {
    pub entries: Vec<BranchEntry>,
    pub exhausted: Option<BudgetExhausted>,
}

/// Hands out agents of each role in turn
pub(crate) struct RoundRobin {
    next: HashMap<AgentType, usize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            next: HashMap::new(),
        }
    }

    pub fn assign(&mut self, dispatcher: &Dispatcher<'_>, role: AgentType) -> Option<Arc<dyn Agent>> {
        let candidates = dispatcher.registry().list_by_type(role);
        if candidates.is_empty() {
            return None;
        }
        let slot = self.next.entry(role).or_insert(0);
        let agent = Arc::clone(&candidates[*slot % candidates.len()]);
        *slot += 1;
        Some(agent)
    }
}

pub(crate) fn no_agent_for(role: AgentType) -> String {
    format!("no agent registered for role {}", role)
}

/// Run every branch concurrently. Steps are recorded in completion order;
/// entries come back ordered by index.
///
/// Branches are admitted in index order while the budget lasts. Once it runs
/// out, the remaining branches are skipped and `exhausted` is set.
pub(crate) async fn run_batch(
    dispatcher: &Dispatcher<'_>,
    task: &Task,
    branches: Vec<Branch>,
    state: &mut CoordinationState,
) -> BatchResult {
    let mut entries = Vec::with_capacity(branches.len());
    let mut exhausted: Option<BudgetExhausted> = None;
    let mut in_flight = FuturesUnordered::new();

    for branch in branches {
        let role = branch.subtask.agent_type;
        let Some(agent) = branch.agent else {
            entries.push(BranchEntry::failed(branch.index, role, None, no_agent_for(role)));
            continue;
        };
        if let Some(reason) = exhausted {
            entries.push(BranchEntry::skipped(branch.index, role, reason.to_string()));
            continue;
        }
        if let Err(reason) = dispatcher.acquire() {
            exhausted = Some(reason);
            entries.push(BranchEntry::skipped(branch.index, role, reason.to_string()));
            continue;
        }

        let branch_task = task.for_subtask(&branch.subtask);
        let context = branch.context;
        let index = branch.index;
        in_flight.push(async move {
            let invocation = dispatcher.call(&agent, &branch_task, &context).await;
            (index, role, invocation)
        });
    }

    tracing::debug!(branches = in_flight.len(), "Parallel batch dispatched");

    while let Some((index, role, invocation)) = in_flight.next().await {
        let agent_id = invocation.step.agent_id.clone();
        state.record_step(invocation.step);
        entries.push(match invocation.outcome {
            Ok(output) => BranchEntry::succeeded(index, role, agent_id, output),
            Err(e) => BranchEntry::failed(index, role, Some(agent_id), e.to_string()),
        });
    }

    entries.sort_by_key(|e| e.index);
    BatchResult { entries, exhausted }
}

pub(crate) async fn run(
    dispatcher: &Dispatcher<'_>,
    task: &Task,
    plan: &[Subtask],
    state: &mut CoordinationState,
) {
    if plan.is_empty() {
        state.fail("task plan is empty");
        return;
    }
    state.task_plan = plan.to_vec();

    let mut round_robin = RoundRobin::new();
    let branches = plan
        .iter()
        .enumerate()
        .map(|(index, subtask)| Branch {
            index,
            subtask: subtask.clone(),
            agent: round_robin.assign(dispatcher, subtask.agent_type),
            context: AgentContext::default(),
        })
        .collect();

    tracing::info!(subtasks = plan.len(), "Parallel fan-out");
    let batch = run_batch(dispatcher, task, branches, state).await;

    if let Some(reason) = batch.exhausted {
        state.fail(reason.to_string());
    } else if aggregate::none_succeeded(&batch.entries) {
        state.fail(ALL_FAILED);
    } else {
        state.finish(aggregate::merge(batch.entries));
    }
}
