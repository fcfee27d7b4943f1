//! Merging branch results into one aggregate output

use crate::core::{AgentOutput, AgentType, ResultKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchStatus {
    Succeeded,
    Failed,
    /// Never invoked
    Skipped,
}

/// Outcome of one subtask, keyed by its plan index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchEntry {
    pub index: usize,
    pub agent_type: AgentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub status: BranchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<AgentOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BranchEntry {
    pub fn succeeded(
        index: usize,
        agent_type: AgentType,
        agent_id: impl Into<String>,
        output: AgentOutput,
    ) -> Self {
        Self {
            index,
            agent_type,
            agent_id: Some(agent_id.into()),
            status: BranchStatus::Succeeded,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(
        index: usize,
        agent_type: AgentType,
        agent_id: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            index,
            agent_type,
            agent_id,
            status: BranchStatus::Failed,
            output: None,
            error: Some(error.into()),
        }
    }

    pub fn skipped(index: usize, agent_type: AgentType, reason: impl Into<String>) -> Self {
        Self {
            index,
            agent_type,
            agent_id: None,
            status: BranchStatus::Skipped,
            output: None,
            error: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BranchStatus::Succeeded
    }
}

/// Aggregate output: the entries as an array ordered by index
pub(crate) fn merge(mut entries: Vec<BranchEntry>) -> AgentOutput {
    entries.sort_by_key(|e| e.index);
    let payload = serde_json::to_value(&entries).unwrap_or_default();
    AgentOutput::new(ResultKind::Aggregate, payload)
}

pub(crate) fn none_succeeded(entries: &[BranchEntry]) -> bool {
    !entries.iter().any(BranchEntry::is_success)
}
