//! Agent trait and shared agent state

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use workstation_common::{AgentId, AgentStatus, AgentType, Metadata, Result, Task, TaskId};

/// Agent capability flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub can_navigate: bool,
    pub can_extract: bool,
    pub can_analyze: bool,
    pub can_execute: bool,
    pub can_validate: bool,
    pub supports_llm: bool,
    pub max_concurrency: u32,
}

impl Default for AgentCapabilities {
    fn default() -> Self {
        Self {
            can_navigate: false,
            can_extract: false,
            can_analyze: false,
            can_execute: false,
            can_validate: false,
            supports_llm: false,
            max_concurrency: 1,
        }
    }
}

/// Mutable agent state, updated as tasks are claimed and released
#[derive(Debug)]
struct AgentRuntime {
    status: AgentStatus,
    current_task_id: Option<TaskId>,
    last_active: DateTime<Utc>,
}

/// Shared identity and runtime record carried by every agent implementation.
///
/// Agents reference their task by id only; the queue owns the task itself.
pub struct AgentBase {
    id: AgentId,
    agent_type: AgentType,
    name: String,
    description: String,
    capabilities: AgentCapabilities,
    created_at: DateTime<Utc>,
    runtime: RwLock<AgentRuntime>,
}

impl AgentBase {
    pub fn new(
        agent_type: AgentType,
        name: impl Into<String>,
        description: impl Into<String>,
        capabilities: AgentCapabilities,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_type,
            name: name.into(),
            description: description.into(),
            capabilities,
            created_at: Utc::now(),
            runtime: RwLock::new(AgentRuntime {
                status: AgentStatus::Idle,
                current_task_id: None,
                last_active: Utc::now(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn capabilities(&self) -> &AgentCapabilities {
        &self.capabilities
    }

    pub fn status(&self) -> AgentStatus {
        self.runtime.read().status
    }

    pub fn current_task_id(&self) -> Option<TaskId> {
        self.runtime.read().current_task_id.clone()
    }

    /// Claim the agent for a task. Succeeds only from `Idle`, so two workers
    /// racing for the same agent cannot both win.
    pub fn try_claim(&self, task_id: &str) -> bool {
        let mut runtime = self.runtime.write();
        if runtime.status != AgentStatus::Idle {
            return false;
        }
        runtime.status = AgentStatus::Initializing;
        runtime.current_task_id = Some(task_id.to_string());
        runtime.last_active = Utc::now();
        true
    }

    pub fn mark_running(&self) {
        let mut runtime = self.runtime.write();
        runtime.status = AgentStatus::Running;
        runtime.last_active = Utc::now();
    }

    pub fn mark_failed(&self) {
        let mut runtime = self.runtime.write();
        runtime.status = AgentStatus::Failed;
        runtime.last_active = Utc::now();
    }

    /// Return the agent to the idle pool, clearing the task reference.
    pub fn release(&self) {
        let mut runtime = self.runtime.write();
        runtime.status = AgentStatus::Idle;
        runtime.current_task_id = None;
        runtime.last_active = Utc::now();
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        let runtime = self.runtime.read();
        AgentSnapshot {
            agent_id: self.id.clone(),
            agent_type: self.agent_type,
            name: self.name.clone(),
            description: self.description.clone(),
            status: runtime.status,
            capabilities: self.capabilities.clone(),
            current_task_id: runtime.current_task_id.clone(),
            created_at: self.created_at.to_rfc3339(),
            last_active: runtime.last_active.to_rfc3339(),
        }
    }
}

/// Serializable agent view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: AgentId,
    pub agent_type: AgentType,
    pub name: String,
    pub description: String,
    pub status: AgentStatus,
    pub capabilities: AgentCapabilities,
    pub current_task_id: Option<TaskId>,
    pub created_at: String,
    pub last_active: String,
}

/// A worker capable of executing tasks of a compatible type.
///
/// `perform` is a pure function from task to output record; all lifecycle
/// bookkeeping (claiming, status transitions, release) is driven by the
/// orchestrator through [`AgentBase`].
#[async_trait]
pub trait Agent: Send + Sync {
    /// Shared identity and runtime record
    fn base(&self) -> &AgentBase;

    /// Execute the task and produce its output record
    async fn perform(&self, task: &Task) -> Result<Metadata>;
}
