//! Common types used across the backend

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Task ID type (opaque unique string)
pub type TaskId = String;

/// Agent ID type
pub type AgentId = String;

/// Generic key-value payload for task input/output and step configs
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Shared handle to a task; the queue indexes hold the same handle the
/// executing worker mutates
pub type TaskRef = Arc<RwLock<Task>>;

/// Task priority levels. Ordered so that `Urgent > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low = 0,
    Medium = 1,
    High = 2,
    Urgent = 3,
}

impl TaskPriority {
    /// All priorities, highest first. Drives the dequeue scan order.
    pub const fn lanes() -> [TaskPriority; 4] {
        [Self::Urgent, Self::High, Self::Medium, Self::Low]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Idle,
    Waiting,
    Initializing,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Waiting => "waiting",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Types of agents in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Navigator,
    Planner,
    Validator,
    Executor,
    Extractor,
    Analyzer,
    Custom,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigator => "navigator",
            Self::Planner => "planner",
            Self::Validator => "validator",
            Self::Executor => "executor",
            Self::Extractor => "extractor",
            Self::Analyzer => "analyzer",
            Self::Custom => "custom",
        }
    }
}

/// Agent execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Initializing,
    Running,
    Waiting,
    Completed,
    Failed,
    Cancelled,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A unit of externally submitted work, typed by intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: String,
    pub description: String,
    pub priority: TaskPriority,
    #[serde(default)]
    pub input: Metadata,
    #[serde(default)]
    pub output: Option<Metadata>,
    pub status: TaskStatus,
    #[serde(default)]
    pub assigned_agent_id: Option<AgentId>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        task_type: impl Into<String>,
        description: impl Into<String>,
        priority: TaskPriority,
        input: Metadata,
    ) -> Self {
        Self {
            task_type: task_type.into(),
            description: description.into(),
            priority,
            input,
            ..Self::default()
        }
    }

    /// Wrap the task into the shared handle the queue and workers exchange
    pub fn into_ref(self) -> TaskRef {
        Arc::new(RwLock::new(self))
    }
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_type: "execute".to_string(),
            description: String::new(),
            priority: TaskPriority::Medium,
            input: Metadata::new(),
            output: None,
            status: TaskStatus::Idle,
            assigned_agent_id: None,
            error: None,
            retry_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Flattened task form returned to external callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assigned_agent_id: Option<AgentId>,
    pub output: Option<Metadata>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            task_type: task.task_type.clone(),
            description: task.description.clone(),
            status: task.status,
            priority: task.priority,
            assigned_agent_id: task.assigned_agent_id.clone(),
            output: task.output.clone(),
            error: task.error.clone(),
            retry_count: task.retry_count,
            created_at: task.created_at.to_rfc3339(),
            started_at: task.started_at.map(|t| t.to_rfc3339()),
            completed_at: task.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Listing filter for task queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFilter {
    Active,
    Completed,
    All,
}
