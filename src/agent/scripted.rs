//! Deterministic agents driven by a script
//!
//! Each invocation consumes the next script step; once the script runs out the
//! last step repeats. An empty script echoes the task.

use super::{Agent, AgentContext, AgentDescriptor, Capability};
use crate::core::{AgentExecutionError, AgentOutput, AgentType, ResultKind, Task};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Return this output
    Reply(AgentOutput),
    /// Fail with this message
    Fail(String),
    /// Panic with this message
    Panic(String),
    /// Sleep, then run the inner step
    Delay(Duration, Box<ScriptStep>),
    /// Reply with the task description; reviewers pass
    Echo,
}

impl ScriptStep {
    pub fn text(kind: ResultKind, text: impl Into<String>) -> Self {
        Self::Reply(AgentOutput::text(kind, text))
    }

    /// Review verdict, with a critique carried as a single suggestion
    pub fn review(passed: bool, critique: impl Into<String>) -> Self {
        let critique = critique.into();
        Self::Reply(AgentOutput::review(
            passed,
            json!({ "text": critique, "suggestions": [critique] }),
        ))
    }

    /// Plan output carrying a subtask list
    pub fn plan(subtasks: serde_json::Value) -> Self {
        Self::Reply(AgentOutput::new(
            ResultKind::Plan,
            json!({ "text": "plan", "subtasks": subtasks }),
        ))
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }

    pub fn delayed(self, delay: Duration) -> Self {
        Self::Delay(delay, Box::new(self))
    }
}

pub struct ScriptedAgent {
    descriptor: AgentDescriptor,
    script: Vec<ScriptStep>,
    cursor: AtomicUsize,
    seen: Mutex<Vec<(Task, AgentContext)>>,
}

impl ScriptedAgent {
    pub fn new(agent_id: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            descriptor: AgentDescriptor::new(agent_id, agent_type, agent_type.label()),
            script: Vec::new(),
            cursor: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Append a step to the script
    pub fn then(mut self, step: ScriptStep) -> Self {
        self.script.push(step);
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.descriptor = self.descriptor.with_capability(capability);
        self
    }

    /// Number of invocations so far
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Tasks and contexts received, in call order
    pub fn invocations(&self) -> Vec<(Task, AgentContext)> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn next_step(&self) -> ScriptStep {
        let n = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.script
            .get(n)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or(ScriptStep::Echo)
    }

    fn echo(&self, task: &Task) -> AgentOutput {
        let agent_type = self.descriptor.agent_type;
        let text = format!("{}: {}", agent_type.label(), task.description);
        match agent_type {
            AgentType::Reviewer => AgentOutput::review(true, json!({ "text": text })),
            other => AgentOutput::text(other.output_kind(), text),
        }
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(
        &self,
        task: &Task,
        context: &AgentContext,
    ) -> Result<AgentOutput, AgentExecutionError> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((task.clone(), context.clone()));

        let mut step = self.next_step();
        loop {
            match step {
                ScriptStep::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    step = *inner;
                }
                ScriptStep::Reply(output) => return Ok(output),
                ScriptStep::Fail(message) => {
                    return Err(AgentExecutionError::failed(self.id(), message))
                }
                ScriptStep::Panic(message) => panic!("{}", message),
                ScriptStep::Echo => return Ok(self.echo(task)),
            }
        }
    }
}
