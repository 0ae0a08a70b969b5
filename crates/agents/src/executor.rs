//! Executor agent implementation

use async_trait::async_trait;
use serde_json::{json, Value};
use workstation_common::{AgentType, Metadata, Result, Task};
use workstation_core::agent::{Agent, AgentBase, AgentCapabilities};

/// Agent specialized in executing browser actions.
///
/// Also serves as the catch-all for task types without a dedicated agent.
pub struct ExecutorAgent {
    base: AgentBase,
}

impl ExecutorAgent {
    pub fn new() -> Self {
        Self {
            base: AgentBase::new(
                AgentType::Executor,
                "Executor Agent",
                "Executes browser actions and automation",
                AgentCapabilities {
                    can_execute: true,
                    max_concurrency: 10,
                    ..AgentCapabilities::default()
                },
            ),
        }
    }
}

impl Default for ExecutorAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ExecutorAgent {
    fn base(&self) -> &AgentBase {
        &self.base
    }

    async fn perform(&self, task: &Task) -> Result<Metadata> {
        let command = task.input.get("command").cloned().unwrap_or(Value::Null);

        let mut output = Metadata::new();
        output.insert("action".to_string(), json!("execute"));
        output.insert("command".to_string(), command);
        output.insert("status".to_string(), json!("success"));
        Ok(output)
    }
}
