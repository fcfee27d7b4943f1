//! Canonical type definitions for the coordination domain
//!
//! Task, result, step and state types shared by the registry, the strategy
//! executors and the transport layer. Other modules `pub use` these rather
//! than defining their own.

use crate::core::errors::CoordinationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Role an agent plays in a coordinated task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Analyst,
    Planner,
    Executor,
    Reviewer,
    Researcher,
}

impl AgentType {
    pub const ALL: [AgentType; 5] = [
        AgentType::Analyst,
        AgentType::Planner,
        AgentType::Executor,
        AgentType::Reviewer,
        AgentType::Researcher,
    ];

    /// Default sequential pipeline
    pub const DEFAULT_PIPELINE: [AgentType; 4] = [
        AgentType::Analyst,
        AgentType::Planner,
        AgentType::Executor,
        AgentType::Reviewer,
    ];

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Analyst => "Analyst",
            Self::Planner => "Planner",
            Self::Executor => "Executor",
            Self::Reviewer => "Reviewer",
            Self::Researcher => "Researcher",
        }
    }

    /// Kind of output an agent of this role produces
    pub fn output_kind(&self) -> ResultKind {
        match self {
            Self::Analyst => ResultKind::Analysis,
            Self::Planner => ResultKind::Plan,
            Self::Executor => ResultKind::Execution,
            Self::Reviewer => ResultKind::Review,
            Self::Researcher => ResultKind::Research,
        }
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "analyst" => Ok(Self::Analyst),
            "planner" => Ok(Self::Planner),
            "executor" => Ok(Self::Executor),
            "reviewer" => Ok(Self::Reviewer),
            "researcher" => Ok(Self::Researcher),
            other => Err(format!("unknown agent type: {}", other)),
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analyst => write!(f, "analyst"),
            Self::Planner => write!(f, "planner"),
            Self::Executor => write!(f, "executor"),
            Self::Reviewer => write!(f, "reviewer"),
            Self::Researcher => write!(f, "researcher"),
        }
    }
}

/// Lifecycle status of a registered agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Busy,
    Failed,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Busy => write!(f, "busy"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Coordination strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinationMode {
    Sequential,
    Parallel,
    Hierarchical,
    Feedback,
}

impl std::str::FromStr for CoordinationMode {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            "hierarchical" => Ok(Self::Hierarchical),
            "feedback" => Ok(Self::Feedback),
            _ => Err(CoordinationError::UnknownMode(s.to_string())),
        }
    }
}

impl std::fmt::Display for CoordinationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
            Self::Hierarchical => write!(f, "hierarchical"),
            Self::Feedback => write!(f, "feedback"),
        }
    }
}

/// A task submitted for coordination. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            task_type: None,
            context: None,
            requirements: Vec::new(),
            session_id: None,
        }
    }

    pub fn with_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_requirement(mut self, requirement: impl Into<String>) -> Self {
        self.requirements.push(requirement.into());
        self
    }

    /// Derive the task handed to one branch of a plan.
    ///
    /// The branch keeps the parent's type, context and session; requirements
    /// stay with the parent.
    pub fn for_subtask(&self, subtask: &Subtask) -> Task {
        Task {
            description: subtask.description.clone(),
            task_type: self.task_type.clone(),
            context: self.context.clone(),
            requirements: Vec::new(),
            session_id: self.session_id.clone(),
        }
    }

    /// Short one-line summary used in step records and logs
    pub fn summary(&self) -> String {
        truncate(&self.description, 80)
    }
}

/// Kind tag of an agent output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Analysis,
    Plan,
    Execution,
    Review,
    Research,
    /// Merge of several branch outputs
    Aggregate,
}

/// Typed result of one agent invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub kind: ResultKind,
    pub payload: Value,
    /// Only meaningful for review outputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed_review: Option<bool>,
}

impl AgentOutput {
    pub fn new(kind: ResultKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            passed_review: None,
        }
    }

    /// Plain-text output of the given kind
    pub fn text(kind: ResultKind, text: impl Into<String>) -> Self {
        Self::new(kind, serde_json::json!({ "text": text.into() }))
    }

    /// Review output with an explicit verdict
    pub fn review(passed: bool, payload: Value) -> Self {
        Self {
            kind: ResultKind::Review,
            payload,
            passed_review: Some(passed),
        }
    }

    /// Whether a review passed. A missing verdict counts as not passed.
    pub fn review_passed(&self) -> bool {
        self.passed_review.unwrap_or(false)
    }

    /// Text body of the payload, if it has one
    pub fn text_body(&self) -> Option<&str> {
        match &self.payload {
            Value::String(s) => Some(s),
            other => other.get("text").and_then(Value::as_str),
        }
    }

    /// Critique carried by a review: `suggestions`, then `critique`, then `text`
    pub fn critique(&self) -> Option<String> {
        if let Some(items) = self.payload.get("suggestions").and_then(Value::as_array) {
            let joined = items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n");
            if !joined.is_empty() {
                return Some(joined);
            }
        }
        if let Some(c) = self.payload.get("critique").and_then(Value::as_str) {
            return Some(c.to_string());
        }
        self.text_body().map(str::to_string)
    }

    /// Short one-line summary for logs and context prompts
    pub fn summary(&self) -> String {
        match self.text_body() {
            Some(text) => truncate(text, 120),
            None => truncate(&self.payload.to_string(), 120),
        }
    }
}

/// One entry of a task plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub description: String,
    pub agent_type: AgentType,
    /// Index of an earlier subtask whose output this one needs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<usize>,
}

impl Subtask {
    pub fn new(description: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            description: description.into(),
            agent_type,
            depends_on: None,
        }
    }

    pub fn depending_on(mut self, index: usize) -> Self {
        self.depends_on = Some(index);
        self
    }
}

/// Log entry for one agent invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub agent_id: String,
    pub agent_type: AgentType,
    pub input_summary: String,
    /// Present iff the invocation succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<AgentOutput>,
    /// Present iff the invocation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
    pub succeeded: bool,
    pub started_at: DateTime<Utc>,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Working record of one task execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationState {
    pub run_id: String,
    pub task: Task,
    pub mode: CoordinationMode,
    /// Append-only, one entry per recorded step
    pub agents_involved: Vec<String>,
    pub steps: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_plan: Vec<Subtask>,
    #[serde(default)]
    pub feedback_rounds: u32,
    pub final_result: Option<AgentOutput>,
    pub is_finished: bool,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl CoordinationState {
    pub fn new(task: Task, mode: CoordinationMode) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            task,
            mode,
            agents_involved: Vec::new(),
            steps: Vec::new(),
            task_plan: Vec::new(),
            feedback_rounds: 0,
            final_result: None,
            is_finished: false,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Append a step; keeps `agents_involved` in lockstep with `steps`
    pub fn record_step(&mut self, step: StepRecord) {
        self.agents_involved.push(step.agent_id.clone());
        self.steps.push(step);
    }

    /// Terminate successfully with a final result
    pub fn finish(&mut self, result: AgentOutput) {
        self.final_result = Some(result);
        self.error = None;
        self.mark_finished();
    }

    /// Terminate with an error. Clears any final result.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.final_result = None;
        self.mark_finished();
    }

    fn mark_finished(&mut self) {
        self.is_finished = true;
        self.finished_at = Some(Utc::now());
    }

    pub fn is_success(&self) -> bool {
        self.is_finished && self.error.is_none()
    }

    /// Steps recorded for agents of one role
    pub fn steps_for(&self, agent_type: AgentType) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(move |s| s.agent_type == agent_type)
    }

    pub fn succeeded_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.succeeded).count()
    }

    pub fn failed_steps(&self) -> usize {
        self.steps.len() - self.succeeded_steps()
    }
}

/// Per-run limits and inputs
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Ceiling on total agent invocations across the run
    pub max_iterations: u32,
    /// Ceiling on executor/reviewer rounds in feedback mode
    pub max_feedback_rounds: u32,
    /// Bound on each individual agent call
    pub agent_timeout: Duration,
    /// Wall-clock bound on starting new invocations
    pub time_budget: Option<Duration>,
    /// Explicit plan for parallel mode
    pub task_plan: Vec<Subtask>,
    /// Role order override for sequential mode
    pub pipeline: Option<Vec<AgentType>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_feedback_rounds: 3,
            agent_timeout: Duration::from_secs(120),
            time_budget: None,
            task_plan: Vec::new(),
            pipeline: None,
        }
    }
}

impl RunOptions {
    pub fn with_max_iterations(mut self, n: u32) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_max_feedback_rounds(mut self, n: u32) -> Self {
        self.max_feedback_rounds = n;
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_task_plan(mut self, plan: Vec<Subtask>) -> Self {
        self.task_plan = plan;
        self
    }

    pub fn with_pipeline(mut self, pipeline: Vec<AgentType>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() > max_chars {
        let cut: String = line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}
