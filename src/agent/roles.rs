//! LLM-backed agents for the five roles
//!
//! One struct covers every role; the role decides the system prompt, the
//! advertised capabilities and how the model's answer is parsed.

use super::{Agent, AgentContext, AgentDescriptor, Capability};
use crate::core::{
    AgentExecutionError, AgentFailure, AgentOutput, AgentType, ResultKind, Subtask, Task,
};
use crate::llm::{GenerateOptions, LlmClient, Prompt};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::sync::Arc;

pub struct RoleAgent {
    descriptor: AgentDescriptor,
    llm: Arc<dyn LlmClient>,
    options: GenerateOptions,
}

impl RoleAgent {
    pub fn new(agent_id: impl Into<String>, agent_type: AgentType, llm: Arc<dyn LlmClient>) -> Self {
        let mut descriptor = AgentDescriptor::new(agent_id, agent_type, agent_type.label())
            .with_description(role_description(agent_type));
        for (name, description, confidence) in role_capabilities(agent_type) {
            descriptor = descriptor.with_capability(Capability::new(*name, *description, *confidence));
        }
        Self {
            descriptor,
            llm,
            options: GenerateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    fn system_prompt(&self) -> String {
        let role = self.descriptor.agent_type;
        format!(
            "You are the {} agent in a team of cooperating agents. {}",
            role.label(),
            role_instructions(role)
        )
    }

    fn user_prompt(&self, task: &Task, context: &AgentContext) -> String {
        let mut out = format!("Task: {}\n", task.description);
        if let Some(t) = &task.task_type {
            let _ = writeln!(out, "Type: {}", t);
        }
        if let Some(c) = &task.context {
            let _ = writeln!(out, "Context: {}", c);
        }
        if !task.requirements.is_empty() {
            out.push_str("Requirements:\n");
            for r in &task.requirements {
                let _ = writeln!(out, "- {}", r);
            }
        }

        if let Some(dep) = &context.dependency {
            let _ = write!(out, "\nDependency output:\n{}\n", body_of(dep));
        }

        if !context.prior_steps.is_empty() {
            out.push_str("\nPrevious steps:\n");
            for step in &context.prior_steps {
                let outcome = match (&step.output, &step.error) {
                    (Some(o), _) => o.summary(),
                    (None, Some(e)) => format!("failed: {}", e),
                    (None, None) => String::new(),
                };
                let _ = writeln!(out, "- {} ({}): {}", step.agent_id, step.agent_type, outcome);
            }
        }

        if let Some(critique) = context.latest_feedback() {
            let _ = write!(
                out,
                "\nRound {}. Reviewer feedback:\n{}\n",
                context.round, critique
            );
        }

        // kept last: everything after this header is the work being judged
        if let Some(reviewed) = &context.under_review {
            let _ = write!(out, "\nOutput under review:\n{}\n", body_of(reviewed));
        }
        out
    }

    fn parse(&self, text: &str) -> Result<AgentOutput, AgentFailure> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AgentFailure::InvalidOutput("empty response".into()));
        }
        let output = match self.descriptor.agent_type {
            AgentType::Planner => parse_plan(text),
            AgentType::Reviewer => parse_review(text),
            other => AgentOutput::text(other.output_kind(), text),
        };
        Ok(output)
    }
}

#[async_trait]
impl Agent for RoleAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(
        &self,
        task: &Task,
        context: &AgentContext,
    ) -> Result<AgentOutput, AgentExecutionError> {
        let prompt = Prompt::new(self.system_prompt(), self.user_prompt(task, context));
        let text = self
            .llm
            .generate(&prompt, &self.options)
            .await
            .map_err(|e| AgentExecutionError::new(self.id(), AgentFailure::Llm(e)))?;
        self.parse(&text)
            .map_err(|cause| AgentExecutionError::new(self.id(), cause))
    }
}

fn body_of(output: &AgentOutput) -> String {
    output
        .text_body()
        .map(str::to_string)
        .unwrap_or_else(|| output.payload.to_string())
}

/// Plan text plus the subtask list, when the answer carries a parsable one
fn parse_plan(text: &str) -> AgentOutput {
    let subtasks = extract_json(text)
        .and_then(|v| v.get("subtasks").cloned())
        .and_then(|v| serde_json::from_value::<Vec<Subtask>>(v).ok());

    match subtasks {
        Some(subtasks) => AgentOutput::new(
            ResultKind::Plan,
            json!({ "text": text, "subtasks": subtasks }),
        ),
        None => AgentOutput::text(ResultKind::Plan, text),
    }
}

/// The fenced ```json block if present, else the outermost `{...}`
fn extract_json(text: &str) -> Option<Value> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + "```json".len()..];
        if let Some(end) = rest.find("```") {
            if let Ok(v) = serde_json::from_str(rest[..end].trim()) {
                return Some(v);
            }
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Reads the last `VERDICT:` line and any `SUGGESTION:` lines
fn parse_review(text: &str) -> AgentOutput {
    let mut verdict = None;
    let mut suggestions = Vec::new();
    for line in text.lines().map(str::trim) {
        let upper = line.to_ascii_uppercase();
        if let Some(v) = upper.strip_prefix("VERDICT:") {
            verdict = match v.trim() {
                "PASS" => Some(true),
                "FAIL" => Some(false),
                _ => verdict,
            };
        } else if upper.starts_with("SUGGESTION:") {
            let s = line["SUGGESTION:".len()..].trim();
            if !s.is_empty() {
                suggestions.push(s.to_string());
            }
        }
    }

    AgentOutput {
        kind: ResultKind::Review,
        payload: json!({ "text": text, "suggestions": suggestions }),
        passed_review: verdict,
    }
}

fn role_description(agent_type: AgentType) -> &'static str {
    match agent_type {
        AgentType::Analyst => "Analyzes requirements and extracts the key facts of a task",
        AgentType::Planner => "Breaks complex tasks into ordered, assignable subtasks",
        AgentType::Executor => "Carries out concrete steps and produces deliverables",
        AgentType::Reviewer => "Checks results for correctness and suggests improvements",
        AgentType::Researcher => "Researches a topic in depth and summarizes findings",
    }
}

fn role_instructions(agent_type: AgentType) -> &'static str {
    match agent_type {
        AgentType::Analyst => {
            "Identify the goal, constraints, inputs and risks of the task. Answer with a concise structured analysis."
        }
        AgentType::Planner => {
            "Break the task into subtasks. Include a ```json block of the form \
             {\"subtasks\": [{\"description\": \"...\", \"agent_type\": \"analyst|planner|executor|reviewer|researcher\", \"depends_on\": <index of an earlier subtask, optional>}]}."
        }
        AgentType::Executor => {
            "Carry out the task and answer with the finished deliverable. If reviewer feedback is given, revise the work to address it."
        }
        AgentType::Reviewer => {
            "Review the output under review against the task. List each improvement on its own line starting with SUGGESTION:. \
             End with a line VERDICT: PASS or VERDICT: FAIL."
        }
        AgentType::Researcher => {
            "Research the topic, combine what is known and answer with a short cited report."
        }
    }
}

fn role_capabilities(agent_type: AgentType) -> &'static [(&'static str, &'static str, f32)] {
    match agent_type {
        AgentType::Analyst => &[
            ("requirements_analysis", "Extract the key information from a request", 0.9),
            ("information_retrieval", "Gather relevant background", 0.85),
            ("data_analysis", "Spot patterns and trends", 0.8),
            ("insight_extraction", "Turn findings into insights", 0.85),
        ],
        AgentType::Planner => &[
            ("task_decomposition", "Split a complex task into subtasks", 0.9),
            ("strategy_planning", "Choose an execution strategy", 0.85),
            ("resource_allocation", "Assign subtasks to agents", 0.8),
            ("risk_assessment", "Anticipate execution risks", 0.75),
        ],
        AgentType::Executor => &[
            ("tool_use", "Drive tools to complete steps", 0.9),
            ("task_execution", "Carry out concrete steps", 0.85),
            ("result_generation", "Produce the deliverable", 0.85),
            ("error_handling", "Recover from execution errors", 0.8),
        ],
        AgentType::Reviewer => &[
            ("result_verification", "Verify results are correct", 0.9),
            ("quality_review", "Judge quality and completeness", 0.85),
            ("error_detection", "Find mistakes in results", 0.85),
            ("improvement_suggestions", "Propose concrete improvements", 0.8),
        ],
        AgentType::Researcher => &[
            ("deep_research", "Investigate a topic in depth", 0.9),
            ("knowledge_synthesis", "Combine several sources", 0.85),
            ("report_writing", "Write structured reports", 0.85),
            ("citation_management", "Track and cite sources", 0.8),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::SimLlm;

    fn agent(agent_type: AgentType) -> RoleAgent {
        RoleAgent::new(format!("{}_001", agent_type), agent_type, Arc::new(SimLlm::new()))
    }

    #[test]
    fn review_verdict_parsing() {
        let out = parse_review("Looks good\nverdict: pass");
        assert_eq!(out.passed_review, Some(true));

        let out = parse_review("SUGGESTION: add tests\nSUGGESTION: rename x\nVERDICT: FAIL");
        assert_eq!(out.passed_review, Some(false));
        assert_eq!(out.critique().unwrap(), "add tests\nrename x");

        let out = parse_review("I have no opinion");
        assert_eq!(out.passed_review, None);
        assert!(!out.review_passed());
    }

    #[test]
    fn plan_parsing_extracts_subtasks() {
        let text = "Plan:\n```json\n{\"subtasks\": [{\"description\": \"a\", \"agent_type\": \"researcher\"}, {\"description\": \"b\", \"agent_type\": \"executor\", \"depends_on\": 0}]}\n```";
        let out = parse_plan(text);
        let subtasks: Vec<Subtask> =
            serde_json::from_value(out.payload["subtasks"].clone()).unwrap();
        assert_eq!(subtasks.len(), 2);
        assert_eq!(subtasks[1].depends_on, Some(0));

        let out = parse_plan("just do it");
        assert!(out.payload.get("subtasks").is_none());
    }

    #[test]
    fn bare_json_object_is_accepted() {
        let out = parse_plan("{\"subtasks\": [{\"description\": \"a\", \"agent_type\": \"analyst\"}]}");
        assert_eq!(out.payload["subtasks"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn prompt_puts_review_target_last() {
        let reviewer = agent(AgentType::Reviewer);
        let ctx = AgentContext::default()
            .with_under_review(AgentOutput::text(ResultKind::Execution, "draft"))
            .with_feedback(vec!["be brief".into()])
            .with_round(2);
        let prompt = reviewer.user_prompt(&Task::new("write"), &ctx);
        assert!(prompt.starts_with("Task: write"));
        assert!(prompt.contains("Round 2. Reviewer feedback:\nbe brief"));
        assert!(prompt.trim_end().ends_with("Output under review:\ndraft"));
    }

    #[tokio::test]
    async fn sim_backed_executor_produces_execution() {
        let executor = agent(AgentType::Executor);
        let out = executor
            .process(&Task::new("draft a memo"), &AgentContext::default())
            .await
            .unwrap();
        assert_eq!(out.kind, ResultKind::Execution);
        assert!(out.text_body().unwrap().contains("draft a memo"));
    }

    #[tokio::test]
    async fn sim_backed_planner_returns_subtasks() {
        let planner = agent(AgentType::Planner);
        let out = planner
            .process(&Task::new("launch"), &AgentContext::default())
            .await
            .unwrap();
        assert_eq!(out.kind, ResultKind::Plan);
        assert_eq!(out.payload["subtasks"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn every_role_advertises_capabilities() {
        for t in AgentType::ALL {
            assert_eq!(agent(t).capabilities().len(), 4);
        }
    }
}
