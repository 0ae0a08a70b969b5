//! Execution persistence seam
//!
//! The engine records executions through this trait when a store is
//! configured. Correctness never depends on the store: failures are logged
//! and execution continues.

use crate::state::{WorkflowState, WorkflowStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use workstation_common::{Metadata, Result};

/// Persisted view of a workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub workflow_id: String,
    pub user_id: Option<i64>,
    pub status: WorkflowStatus,
    pub context: Metadata,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    pub fn from_state(state: &WorkflowState, user_id: Option<i64>) -> Self {
        Self {
            execution_id: state.execution_id.clone(),
            workflow_id: state.workflow_id.clone(),
            user_id,
            status: state.status,
            context: state.context.clone(),
            result: state.result.clone(),
            error_message: state.error_message.clone(),
            started_at: state.started_at,
            completed_at: state.completed_at,
        }
    }
}

/// Collaborator that persists execution records
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Record a freshly created execution
    async fn insert_execution(&self, record: &ExecutionRecord) -> Result<()>;

    /// Record the terminal status and result of an execution
    async fn update_execution(
        &self,
        execution_id: &str,
        status: WorkflowStatus,
        result: Option<serde_json::Value>,
        error_message: Option<String>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

/// In-memory store, used by default and in tests
#[derive(Default)]
pub struct InMemoryExecutionStore {
    records: Mutex<HashMap<String, ExecutionRecord>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, execution_id: &str) -> Option<ExecutionRecord> {
        self.records.lock().get(execution_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn insert_execution(&self, record: &ExecutionRecord) -> Result<()> {
        self.records
            .lock()
            .insert(record.execution_id.clone(), record.clone());
        Ok(())
    }

    async fn update_execution(
        &self,
        execution_id: &str,
        status: WorkflowStatus,
        result: Option<serde_json::Value>,
        error_message: Option<String>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if let Some(record) = self.records.lock().get_mut(execution_id) {
            record.status = status;
            record.result = result;
            record.error_message = error_message;
            record.completed_at = completed_at;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_update() {
        let store = InMemoryExecutionStore::new();
        let state = WorkflowState::new("exec-1", "wf-1", Metadata::new());
        store
            .insert_execution(&ExecutionRecord::from_state(&state, Some(7)))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);

        store
            .update_execution(
                "exec-1",
                WorkflowStatus::Completed,
                None,
                None,
                Some(Utc::now()),
            )
            .await
            .unwrap();
        let record = store.get("exec-1").unwrap();
        assert_eq!(record.status, WorkflowStatus::Completed);
        assert_eq!(record.user_id, Some(7));
        assert!(record.completed_at.is_some());
    }
}
