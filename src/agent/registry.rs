//! Agent catalog
//!
//! Agents are kept in registration order behind a read-mostly lock. Status is
//! tracked in a concurrent map next to it, so parallel branches can update it
//! without taking the catalog write lock. An agent serving several branches
//! at once stays busy until its last call returns.

use super::{Agent, AgentDescriptor, RoleAgent};
use crate::core::{AgentStatus, AgentType, CoordinationError};
use crate::llm::{GenerateOptions, LlmClient};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Descriptor plus live status, as reported to callers
#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    #[serde(flatten)]
    pub descriptor: AgentDescriptor,
    pub status: AgentStatus,
}

/// Roster totals
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RegistryStatistics {
    pub total_agents: usize,
    pub agents_by_type: BTreeMap<String, usize>,
    pub agents_by_status: BTreeMap<String, usize>,
}

/// Calls in flight plus the outcome of the most recent one
#[derive(Debug, Clone, Copy, Default)]
struct Occupancy {
    in_flight: u32,
    settled: AgentStatus,
}

impl Occupancy {
    fn status(&self) -> AgentStatus {
        if self.in_flight > 0 {
            AgentStatus::Busy
        } else {
            self.settled
        }
    }
}

#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<Vec<Arc<dyn Agent>>>,
    status: DashMap<String, Occupancy>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding one LLM-backed agent per role:
    /// `analyst_001`, `planner_001`, `executor_001`, `reviewer_001`, `researcher_001`
    pub fn with_default_roster(llm: Arc<dyn LlmClient>) -> Self {
        Self::with_default_roster_options(llm, GenerateOptions::default())
    }

    /// Default roster with explicit sampling options for every agent
    pub fn with_default_roster_options(llm: Arc<dyn LlmClient>, options: GenerateOptions) -> Self {
        let registry = Self::new();
        for agent_type in AgentType::ALL {
            let id = format!("{}_001", agent_type);
            let agent =
                RoleAgent::new(id, agent_type, Arc::clone(&llm)).with_options(options.clone());
            // ids are distinct by construction
            if let Err(e) = registry.register(Arc::new(agent)) {
                tracing::warn!("Skipping default agent: {}", e);
            }
        }
        registry
    }

    /// Add an agent. Fails if the id is taken.
    pub fn register(&self, agent: Arc<dyn Agent>) -> Result<(), CoordinationError> {
        let id = agent.id().to_string();
        let mut agents = self.write_agents();
        if agents.iter().any(|a| a.id() == id) {
            return Err(CoordinationError::DuplicateAgent(id));
        }
        tracing::debug!(agent_id = %id, agent_type = %agent.agent_type(), "Registered agent");
        agents.push(agent);
        self.status.insert(id, Occupancy::default());
        Ok(())
    }

    pub fn unregister(&self, agent_id: &str) -> Result<Arc<dyn Agent>, CoordinationError> {
        let mut agents = self.write_agents();
        let pos = agents
            .iter()
            .position(|a| a.id() == agent_id)
            .ok_or_else(|| CoordinationError::AgentNotFound(agent_id.to_string()))?;
        self.status.remove(agent_id);
        Ok(agents.remove(pos))
    }

    pub fn get(&self, agent_id: &str) -> Result<Arc<dyn Agent>, CoordinationError> {
        self.read_agents()
            .iter()
            .find(|a| a.id() == agent_id)
            .cloned()
            .ok_or_else(|| CoordinationError::AgentNotFound(agent_id.to_string()))
    }

    /// Agents of one role, in registration order
    pub fn list_by_type(&self, agent_type: AgentType) -> Vec<Arc<dyn Agent>> {
        self.read_agents()
            .iter()
            .filter(|a| a.agent_type() == agent_type)
            .cloned()
            .collect()
    }

    /// Agents advertising a capability tag, in registration order
    pub fn list_by_capability(&self, tag: &str) -> Vec<Arc<dyn Agent>> {
        self.read_agents()
            .iter()
            .filter(|a| a.descriptor().has_capability(tag))
            .cloned()
            .collect()
    }

    /// First idle agent of the role, else the first agent of the role
    pub fn find_best(&self, agent_type: AgentType) -> Option<Arc<dyn Agent>> {
        let candidates = self.list_by_type(agent_type);
        candidates
            .iter()
            .find(|a| self.status(a.id()) == Some(AgentStatus::Idle))
            .or_else(|| candidates.first())
            .cloned()
    }

    pub fn has_type(&self, agent_type: AgentType) -> bool {
        self.read_agents().iter().any(|a| a.agent_type() == agent_type)
    }

    /// Roles in `required` with no registered agent, first occurrence order
    pub fn missing_roles(&self, required: &[AgentType]) -> Vec<AgentType> {
        let mut missing = Vec::new();
        for role in required {
            if !missing.contains(role) && !self.has_type(*role) {
                missing.push(*role);
            }
        }
        missing
    }

    /// Override the settled status. Calls still in flight keep the agent busy.
    pub fn set_status(&self, agent_id: &str, status: AgentStatus) {
        if let Some(mut entry) = self.status.get_mut(agent_id) {
            entry.settled = status;
        }
    }

    /// Mark one more call in flight on the agent
    pub fn begin_call(&self, agent_id: &str) {
        if let Some(mut entry) = self.status.get_mut(agent_id) {
            entry.in_flight += 1;
        }
    }

    /// Mark a call finished. The agent leaves `Busy` once nothing is in flight.
    pub fn end_call(&self, agent_id: &str, succeeded: bool) {
        if let Some(mut entry) = self.status.get_mut(agent_id) {
            entry.in_flight = entry.in_flight.saturating_sub(1);
            entry.settled = if succeeded {
                AgentStatus::Idle
            } else {
                AgentStatus::Failed
            };
        }
    }

    pub fn status(&self, agent_id: &str) -> Option<AgentStatus> {
        self.status.get(agent_id).map(|entry| entry.status())
    }

    pub fn info(&self, agent_id: &str) -> Result<AgentInfo, CoordinationError> {
        let agent = self.get(agent_id)?;
        Ok(self.info_for(agent.as_ref()))
    }

    /// Every agent with its status, in registration order
    pub fn list(&self) -> Vec<AgentInfo> {
        self.read_agents()
            .iter()
            .map(|a| self.info_for(a.as_ref()))
            .collect()
    }

    pub fn statistics(&self) -> RegistryStatistics {
        let mut stats = RegistryStatistics::default();
        for info in self.list() {
            stats.total_agents += 1;
            *stats
                .agents_by_type
                .entry(info.descriptor.agent_type.to_string())
                .or_default() += 1;
            *stats
                .agents_by_status
                .entry(info.status.to_string())
                .or_default() += 1;
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.read_agents().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn info_for(&self, agent: &dyn Agent) -> AgentInfo {
        AgentInfo {
            descriptor: agent.descriptor().clone(),
            status: self.status(agent.id()).unwrap_or_default(),
        }
    }

    fn read_agents(&self) -> RwLockReadGuard<'_, Vec<Arc<dyn Agent>>> {
        self.agents.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Agent registry read lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_agents(&self) -> RwLockWriteGuard<'_, Vec<Arc<dyn Agent>>> {
        self.agents.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Agent registry write lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ScriptedAgent;
    use crate::llm::SimLlm;

    fn scripted(id: &str, agent_type: AgentType) -> Arc<dyn Agent> {
        Arc::new(ScriptedAgent::new(id, agent_type))
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let registry = AgentRegistry::new();
        registry.register(scripted("a", AgentType::Analyst)).unwrap();
        let err = registry
            .register(scripted("a", AgentType::Planner))
            .unwrap_err();
        assert!(matches!(err, CoordinationError::DuplicateAgent(id) if id == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn find_best_prefers_idle_in_registration_order() {
        let registry = AgentRegistry::new();
        registry.register(scripted("e1", AgentType::Executor)).unwrap();
        registry.register(scripted("e2", AgentType::Executor)).unwrap();

        assert_eq!(registry.find_best(AgentType::Executor).unwrap().id(), "e1");

        registry.set_status("e1", AgentStatus::Busy);
        assert_eq!(registry.find_best(AgentType::Executor).unwrap().id(), "e2");

        registry.set_status("e2", AgentStatus::Failed);
        assert_eq!(registry.find_best(AgentType::Executor).unwrap().id(), "e1");

        assert!(registry.find_best(AgentType::Reviewer).is_none());
    }

    #[test]
    fn overlapping_calls_keep_agent_busy() {
        let registry = AgentRegistry::new();
        registry.register(scripted("e", AgentType::Executor)).unwrap();

        registry.begin_call("e");
        registry.begin_call("e");
        registry.end_call("e", true);
        assert_eq!(registry.status("e"), Some(AgentStatus::Busy));

        registry.end_call("e", false);
        assert_eq!(registry.status("e"), Some(AgentStatus::Failed));

        registry.begin_call("e");
        registry.end_call("e", true);
        assert_eq!(registry.status("e"), Some(AgentStatus::Idle));
    }

    #[test]
    fn unregister_drops_status() {
        let registry = AgentRegistry::new();
        registry.register(scripted("r1", AgentType::Reviewer)).unwrap();
        registry.unregister("r1").unwrap();
        assert!(registry.status("r1").is_none());
        assert!(matches!(
            registry.unregister("r1"),
            Err(CoordinationError::AgentNotFound(_))
        ));
    }

    #[test]
    fn missing_roles_are_deduplicated() {
        let registry = AgentRegistry::new();
        registry.register(scripted("p", AgentType::Planner)).unwrap();
        let missing = registry.missing_roles(&[
            AgentType::Executor,
            AgentType::Planner,
            AgentType::Executor,
            AgentType::Reviewer,
        ]);
        assert_eq!(missing, vec![AgentType::Executor, AgentType::Reviewer]);
    }

    #[test]
    fn default_roster_has_one_agent_per_role() {
        let registry = AgentRegistry::with_default_roster(Arc::new(SimLlm::new()));
        assert_eq!(registry.len(), 5);
        assert!(registry.get("reviewer_001").is_ok());

        let stats = registry.statistics();
        assert_eq!(stats.total_agents, 5);
        assert_eq!(stats.agents_by_type.get("planner"), Some(&1));
        assert_eq!(stats.agents_by_status.get("idle"), Some(&5));
    }

    #[test]
    fn capability_lookup_uses_tags() {
        let registry = AgentRegistry::with_default_roster(Arc::new(SimLlm::new()));
        let reviewers = registry.list_by_capability("quality_review");
        assert_eq!(reviewers.len(), 1);
        assert_eq!(reviewers[0].id(), "reviewer_001");
    }
}
