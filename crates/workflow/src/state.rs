//! Workflow execution state

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use workstation_common::Metadata;

/// Shared handle to a live execution; branch tasks and status readers hold
/// the same handle and publish through its lock
pub type ExecutionRef = Arc<RwLock<WorkflowState>>;

/// Step execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Workflow execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// State for a single workflow step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepState {
    pub id: String,
    pub status: StepStatus,
    /// Resolved config snapshot the step ran with
    #[serde(default)]
    pub input: Metadata,
    #[serde(default)]
    pub output: Option<Metadata>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retry_count: u32,
}

impl StepState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: StepStatus::Pending,
            input: Metadata::new(),
            output: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            retry_count: 0,
        }
    }
}

/// State for a workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub execution_id: String,
    pub workflow_id: String,
    pub status: WorkflowStatus,
    /// Initial parameters plus step outputs under `step_<step_id>` keys
    #[serde(default)]
    pub context: Metadata,
    #[serde(default)]
    pub step_states: HashMap<String, StepState>,
    #[serde(default)]
    pub current_step_id: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowState {
    pub fn new(
        execution_id: impl Into<String>,
        workflow_id: impl Into<String>,
        context: Metadata,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            workflow_id: workflow_id.into(),
            status: WorkflowStatus::Pending,
            context,
            step_states: HashMap::new(),
            current_step_id: None,
            result: None,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Per-step results keyed by step id: `{status, output, error}`
    pub fn step_results(&self) -> serde_json::Value {
        let mut results = serde_json::Map::new();
        for (step_id, step) in &self.step_states {
            results.insert(
                step_id.clone(),
                serde_json::json!({
                    "status": step.status.as_str(),
                    "output": step.output,
                    "error": step.error_message,
                }),
            );
        }
        serde_json::Value::Object(results)
    }
}
