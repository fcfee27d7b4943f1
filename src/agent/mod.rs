//! Agent capability contract and the agents that implement it

pub mod registry;
mod roles;
mod scripted;

pub use registry::{AgentInfo, AgentRegistry, RegistryStatistics};
pub use roles::RoleAgent;
pub use scripted::{ScriptStep, ScriptedAgent};

use crate::core::{AgentExecutionError, AgentOutput, AgentType, StepRecord, Task};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A skill an agent advertises. The tag is `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub description: String,
    /// Self-reported confidence in [0, 1]
    pub confidence: f32,
}

impl Capability {
    pub fn new(name: impl Into<String>, description: impl Into<String>, confidence: f32) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Static identity of an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub agent_id: String,
    pub agent_type: AgentType,
    pub name: String,
    pub description: String,
    pub capabilities: Vec<Capability>,
}

impl AgentDescriptor {
    pub fn new(agent_id: impl Into<String>, agent_type: AgentType, name: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_type,
            name: name.into(),
            description: String::new(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c.name == tag)
    }
}

/// What an agent sees besides the task itself
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    /// Earlier steps of this run, in record order
    pub prior_steps: Vec<StepRecord>,
    /// Output a reviewer is asked to judge
    pub under_review: Option<AgentOutput>,
    /// Critiques from earlier review rounds, oldest first
    pub feedback: Vec<String>,
    /// Output of the subtask this one depends on
    pub dependency: Option<AgentOutput>,
    /// Feedback round, starting at 1. Zero outside feedback mode.
    pub round: u32,
}

impl AgentContext {
    pub fn with_prior_steps(mut self, steps: &[StepRecord]) -> Self {
        self.prior_steps = steps.to_vec();
        self
    }

    pub fn with_under_review(mut self, output: AgentOutput) -> Self {
        self.under_review = Some(output);
        self
    }

    pub fn with_feedback(mut self, feedback: Vec<String>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn with_dependency(mut self, output: AgentOutput) -> Self {
        self.dependency = Some(output);
        self
    }

    pub fn with_round(mut self, round: u32) -> Self {
        self.round = round;
        self
    }

    /// Most recent critique, if any
    pub fn latest_feedback(&self) -> Option<&str> {
        self.feedback.last().map(String::as_str)
    }
}

/// The capability contract every agent implements
///
/// Implementations must not keep per-call state: the same instance may be
/// invoked concurrently by parallel branches.
#[async_trait]
pub trait Agent: Send + Sync {
    fn descriptor(&self) -> &AgentDescriptor;

    fn id(&self) -> &str {
        &self.descriptor().agent_id
    }

    fn agent_type(&self) -> AgentType {
        self.descriptor().agent_type
    }

    /// Capability tags
    fn capabilities(&self) -> Vec<String> {
        self.descriptor()
            .capabilities
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Produce a result for `task`
    async fn process(
        &self,
        task: &Task,
        context: &AgentContext,
    ) -> Result<AgentOutput, AgentExecutionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(Capability::new("x", "", 1.7).confidence, 1.0);
        assert_eq!(Capability::new("x", "", -0.2).confidence, 0.0);
    }

    #[test]
    fn descriptor_capability_lookup() {
        let d = AgentDescriptor::new("a1", AgentType::Analyst, "Analyst")
            .with_capability(Capability::new("requirements_analysis", "", 0.9));
        assert!(d.has_capability("requirements_analysis"));
        assert!(!d.has_capability("code_review"));
    }

    #[test]
    fn latest_feedback_is_last_entry() {
        let ctx = AgentContext::default().with_feedback(vec!["a".into(), "b".into()]);
        assert_eq!(ctx.latest_feedback(), Some("b"));
        assert_eq!(AgentContext::default().latest_feedback(), None);
    }
}
