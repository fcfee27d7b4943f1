//! Single agent invocation
//!
//! Every strategy goes through [`Dispatcher`]: it takes a slot from the run's
//! invocation budget, flips the agent's status, bounds the call with a timeout,
//! turns panics into failures and produces the step record.

use crate::agent::{Agent, AgentContext, AgentRegistry};
use crate::core::{AgentExecutionError, AgentFailure, AgentOutput, StepRecord, Task};
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;

/// Why no further invocation may start
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BudgetExhausted {
    #[error("max iterations exceeded")]
    Iterations,
    #[error("time budget exceeded")]
    Time,
}

/// Invocation slots shared by everything one run starts
#[derive(Debug)]
pub(crate) struct Budget {
    max_iterations: u32,
    used: AtomicU32,
    deadline: Option<Instant>,
}

impl Budget {
    /// A time budget too large to represent as an instant means no deadline
    pub fn new(max_iterations: u32, time_budget: Option<Duration>) -> Self {
        Self {
            max_iterations,
            used: AtomicU32::new(0),
            deadline: time_budget.and_then(|d| Instant::now().checked_add(d)),
        }
    }

    /// Take one slot
    pub fn acquire(&self) -> Result<(), BudgetExhausted> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(BudgetExhausted::Time);
            }
        }
        let max = self.max_iterations;
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| BudgetExhausted::Iterations)
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }
}

/// A finished invocation: the step to record plus the agent's result
pub(crate) struct Invocation {
    pub step: StepRecord,
    pub outcome: Result<AgentOutput, AgentExecutionError>,
}

pub(crate) struct Dispatcher<'a> {
    registry: &'a AgentRegistry,
    budget: Budget,
    agent_timeout: Duration,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a AgentRegistry, budget: Budget, agent_timeout: Duration) -> Self {
        Self {
            registry,
            budget,
            agent_timeout,
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        self.registry
    }

    pub fn acquire(&self) -> Result<(), BudgetExhausted> {
        self.budget.acquire()
    }

    pub fn invocations(&self) -> u32 {
        self.budget.used()
    }

    /// Acquire a slot, then call the agent
    pub async fn invoke(
        &self,
        agent: &Arc<dyn Agent>,
        task: &Task,
        context: &AgentContext,
    ) -> Result<Invocation, BudgetExhausted> {
        self.acquire()?;
        Ok(self.call(agent, task, context).await)
    }

    /// Call the agent. The caller must already hold a budget slot.
    pub async fn call(
        &self,
        agent: &Arc<dyn Agent>,
        task: &Task,
        context: &AgentContext,
    ) -> Invocation {
        let agent_id = agent.id().to_string();
        let agent_type = agent.agent_type();
        self.registry.begin_call(&agent_id);

        let started_at = Utc::now();
        let start = Instant::now();

        let outcome = match timeout(
            self.agent_timeout,
            AssertUnwindSafe(agent.process(task, context)).catch_unwind(),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(panic_info)) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                tracing::error!("Agent '{}' panicked: {}", agent_id, panic_msg);
                Err(AgentExecutionError::new(
                    &agent_id,
                    AgentFailure::Panicked(panic_msg),
                ))
            }
            Err(_) => Err(AgentExecutionError::new(
                &agent_id,
                AgentFailure::Timeout(self.agent_timeout),
            )),
        };
        let duration = start.elapsed();

        let (output, error) = match &outcome {
            Ok(out) => {
                self.registry.end_call(&agent_id, true);
                tracing::debug!(
                    agent_id = %agent_id,
                    agent_type = %agent_type,
                    duration_ms = duration.as_millis() as u64,
                    "Step succeeded: {}",
                    out.summary()
                );
                (Some(out.clone()), None)
            }
            Err(e) => {
                self.registry.end_call(&agent_id, false);
                tracing::warn!(
                    agent_id = %agent_id,
                    agent_type = %agent_type,
                    duration_ms = duration.as_millis() as u64,
                    "Step failed: {}",
                    e
                );
                (None, Some(e.to_string()))
            }
        };

        let step = StepRecord {
            agent_id,
            agent_type,
            input_summary: task.summary(),
            succeeded: output.is_some(),
            output,
            error,
            duration,
            started_at,
        };
        Invocation { step, outcome }
    }
}
