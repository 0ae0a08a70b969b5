//! Agent registry: registration, discovery, and status counts
//!
//! The registry is a directory, not the authority on agent liveness: agents
//! mutate their own status during execution, so callers may observe stale
//! status between the lookup and the claim.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use workstation_common::{AgentId, AgentStatus, AgentType};
use workstation_core::agent::Agent;

struct RegistryInner {
    agents: HashMap<AgentId, Arc<dyn Agent>>,
    by_type: HashMap<AgentType, Vec<Arc<dyn Agent>>>,
}

/// Central registry for all agents in the system
pub struct AgentRegistry {
    inner: Mutex<RegistryInner>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                agents: HashMap::new(),
                by_type: HashMap::new(),
            }),
        }
    }

    /// Insert an agent. A duplicate id replaces the prior entry.
    pub fn register(&self, agent: Arc<dyn Agent>) {
        let mut inner = self.inner.lock();
        let id = agent.base().id().to_string();
        let agent_type = agent.base().agent_type();

        if let Some(previous) = inner.agents.insert(id.clone(), Arc::clone(&agent)) {
            let previous_type = previous.base().agent_type();
            if let Some(list) = inner.by_type.get_mut(&previous_type) {
                list.retain(|a| a.base().id() != id);
            }
        }

        inner.by_type.entry(agent_type).or_default().push(agent);
        debug!(agent_id = %id, agent_type = agent_type.as_str(), "registered agent");
    }

    /// Remove an agent from both indexes
    pub fn deregister(&self, agent_id: &str) -> bool {
        let mut inner = self.inner.lock();
        let Some(agent) = inner.agents.remove(agent_id) else {
            return false;
        };
        let agent_type = agent.base().agent_type();
        if let Some(list) = inner.by_type.get_mut(&agent_type) {
            list.retain(|a| a.base().id() != agent_id);
        }
        debug!(agent_id, "deregistered agent");
        true
    }

    pub fn get(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        self.inner.lock().agents.get(agent_id).cloned()
    }

    /// All agents of a type, in registration order
    pub fn by_type(&self, agent_type: AgentType) -> Vec<Arc<dyn Agent>> {
        self.inner
            .lock()
            .by_type
            .get(&agent_type)
            .cloned()
            .unwrap_or_default()
    }

    /// First idle agent of the given type. No fairness guarantee beyond
    /// registration order.
    pub fn available(&self, agent_type: AgentType) -> Option<Arc<dyn Agent>> {
        let inner = self.inner.lock();
        inner
            .by_type
            .get(&agent_type)?
            .iter()
            .find(|a| a.base().status() == AgentStatus::Idle)
            .cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn Agent>> {
        self.inner.lock().agents.values().cloned().collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.lock();
        let mut by_type: HashMap<String, usize> = HashMap::new();
        let mut by_status: HashMap<String, usize> = HashMap::new();

        for agent in inner.agents.values() {
            *by_type
                .entry(agent.base().agent_type().as_str().to_string())
                .or_default() += 1;
            *by_status
                .entry(agent.base().status().as_str().to_string())
                .or_default() += 1;
        }

        RegistryStats {
            total_agents: inner.agents.len(),
            by_type,
            by_status,
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_agents: usize,
    pub by_type: HashMap<String, usize>,
    pub by_status: HashMap<String, usize>,
}
