//! Workflow executor facade
//!
//! Thin adapter over the engine that flattens execution state into
//! serializable summaries for the surrounding API layer.

use crate::engine::WorkflowEngine;
use crate::state::{StepStatus, WorkflowStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use workstation_common::{Metadata, Result};
use workstation_core::workflow::WorkflowDefinition;

/// High-level API over workflow execution
pub struct WorkflowExecutor {
    engine: Arc<WorkflowEngine>,
}

/// Flattened execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_id: Option<String>,
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub step_results: Option<serde_json::Value>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

/// Progress view of a live or finished execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionProgress {
    pub execution_id: String,
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub current_step: Option<String>,
    pub progress: ProgressCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressCounts {
    pub total_steps: usize,
    pub completed_steps: usize,
    pub failed_steps: usize,
}

impl WorkflowExecutor {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }

    pub fn register_workflow(&self, definition: WorkflowDefinition) -> Result<()> {
        self.engine.register_workflow(definition)
    }

    /// Execute a workflow and flatten the outcome. Engine-level failures
    /// (such as an unknown workflow id) are reported in the summary rather
    /// than escaping to the caller.
    pub async fn execute(
        &self,
        workflow_id: &str,
        parameters: Metadata,
        user_id: Option<i64>,
    ) -> ExecutionSummary {
        match self
            .engine
            .execute_workflow(workflow_id, parameters, user_id)
            .await
        {
            Ok(state) => ExecutionSummary {
                execution_id: Some(state.execution_id.clone()),
                workflow_id: state.workflow_id.clone(),
                status: state.status,
                result: state.result.clone(),
                error: state.error_message.clone(),
                step_results: Some(state.step_results()),
                started_at: state.started_at.map(|t| t.to_rfc3339()),
                completed_at: state.completed_at.map(|t| t.to_rfc3339()),
            },
            Err(err) => {
                error!(workflow_id, error = %err, "workflow execution failed");
                ExecutionSummary {
                    execution_id: None,
                    workflow_id: workflow_id.to_string(),
                    status: WorkflowStatus::Failed,
                    result: None,
                    error: Some(err.to_string()),
                    step_results: None,
                    started_at: None,
                    completed_at: None,
                }
            }
        }
    }

    /// Progress counts for an execution, or `None` when unknown
    pub fn get_status(&self, execution_id: &str) -> Option<ExecutionProgress> {
        let state = self.engine.execution_state(execution_id)?;
        let completed_steps = state
            .step_states
            .values()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        let failed_steps = state
            .step_states
            .values()
            .filter(|s| s.status == StepStatus::Failed)
            .count();

        Some(ExecutionProgress {
            execution_id: state.execution_id.clone(),
            workflow_id: state.workflow_id.clone(),
            status: state.status,
            current_step: state.current_step_id.clone(),
            progress: ProgressCounts {
                total_steps: state.step_states.len(),
                completed_steps,
                failed_steps,
            },
        })
    }
}
