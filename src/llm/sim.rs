//! Deterministic offline model
//!
//! Answers role prompts with canned text so the whole pipeline can run without
//! network access. The same prompt always produces the same answer.
//!
//! Behavior by role (taken from the `You are the <Role> agent` system line):
//! - planner: a short plan plus a fenced JSON subtask list
//! - executor: a deliverable; mentions reviewer feedback when the prompt has any
//! - reviewer: fails work that has not addressed feedback yet, passes it after
//! - analyst, researcher: short notes about the task

use super::{GenerateOptions, LlmClient, LlmError, Prompt};
use crate::core::AgentType;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub struct SimLlm {
    model: String,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl Default for SimLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl SimLlm {
    pub fn new() -> Self {
        Self {
            model: "sim-1".to_string(),
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of generate calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn respond(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let system = prompt.system_text().unwrap_or_default();
        let user = prompt.last_user_text().unwrap_or_default();

        let role = AgentType::ALL
            .into_iter()
            .find(|t| system.contains(&format!("You are the {} agent", t.label())))
            .ok_or_else(|| LlmError::BadRequest("sim model needs a role system prompt".into()))?;

        let task = section(user, "Task:").unwrap_or("the task");

        let text = match role {
            AgentType::Analyst => format!(
                "Analysis of \"{task}\":\n- Goal: deliver {task}\n- Constraints: keep scope tight\n- Risks: unclear acceptance criteria"
            ),
            AgentType::Researcher => format!(
                "Research notes on \"{task}\":\n- Prior art reviewed\n- Two viable approaches identified"
            ),
            AgentType::Planner => {
                let subtasks = serde_json::json!({
                    "subtasks": [
                        { "description": format!("Research background for {}", task), "agent_type": "researcher" },
                        { "description": format!("Analyze requirements of {}", task), "agent_type": "analyst" },
                        { "description": format!("Produce the deliverable for {}", task), "agent_type": "executor", "depends_on": 0 }
                    ]
                });
                format!(
                    "Plan for \"{task}\": research, analyze, then execute.\n```json\n{}\n```",
                    subtasks
                )
            }
            AgentType::Executor => match section(user, "Reviewer feedback:") {
                Some(feedback) => format!(
                    "Revised deliverable for \"{task}\".\nAddressed feedback: {feedback}"
                ),
                None => format!("Deliverable for \"{task}\": first draft."),
            },
            AgentType::Reviewer => {
                let reviewed = user
                    .split_once("Output under review:")
                    .map(|(_, rest)| rest)
                    .unwrap_or_default();
                if reviewed.contains("Addressed feedback") {
                    "The revision addresses the earlier points.\nVERDICT: PASS".to_string()
                } else {
                    "SUGGESTION: state the acceptance criteria explicitly\nVERDICT: FAIL".to_string()
                }
            }
        };
        Ok(text)
    }
}

/// Text following a `Header:` line (same line or the next non-empty one)
fn section<'a>(text: &'a str, header: &str) -> Option<&'a str> {
    let start = text.find(header)? + header.len();
    let rest = &text[start..];
    rest.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
}

#[async_trait]
impl LlmClient for SimLlm {
    fn name(&self) -> &str {
        "sim"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        _options: &GenerateOptions,
    ) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.respond(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(role: &str, user: &str) -> Prompt {
        Prompt::new(format!("You are the {} agent.", role), user)
    }

    #[tokio::test]
    async fn planner_emits_subtask_json() {
        let llm = SimLlm::new();
        let text = llm
            .generate(&prompt("Planner", "Task: ship it"), &GenerateOptions::default())
            .await
            .unwrap();
        assert!(text.contains("\"subtasks\""));
        assert!(text.contains("ship it"));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn reviewer_passes_only_revised_work() {
        let llm = SimLlm::new();
        let opts = GenerateOptions::default();

        let first = llm
            .generate(
                &prompt("Reviewer", "Task: t\n\nOutput under review:\nfirst draft"),
                &opts,
            )
            .await
            .unwrap();
        assert!(first.contains("VERDICT: FAIL"));

        let second = llm
            .generate(
                &prompt(
                    "Reviewer",
                    "Task: t\n\nOutput under review:\nRevised. Addressed feedback: x",
                ),
                &opts,
            )
            .await
            .unwrap();
        assert!(second.contains("VERDICT: PASS"));
    }

    #[tokio::test]
    async fn same_prompt_same_answer() {
        let llm = SimLlm::new();
        let p = prompt("Analyst", "Task: compare caches");
        let a = llm.generate(&p, &GenerateOptions::default()).await.unwrap();
        let b = llm.generate(&p, &GenerateOptions::default()).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn unknown_role_is_rejected() {
        let llm = SimLlm::new();
        let err = llm
            .generate(&Prompt::new("hi", "Task: x"), &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::BadRequest(_)));
    }
}
