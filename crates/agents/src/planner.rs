//! Planner agent implementation

use async_trait::async_trait;
use serde_json::json;
use workstation_common::{AgentType, Metadata, Result, Task};
use workstation_core::agent::{Agent, AgentBase, AgentCapabilities};

/// Agent specialized in task planning and decomposition
pub struct PlannerAgent {
    base: AgentBase,
}

impl PlannerAgent {
    pub fn new() -> Self {
        Self {
            base: AgentBase::new(
                AgentType::Planner,
                "Planner Agent",
                "Plans and decomposes complex tasks",
                AgentCapabilities {
                    supports_llm: true,
                    max_concurrency: 5,
                    ..AgentCapabilities::default()
                },
            ),
        }
    }
}

impl Default for PlannerAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn base(&self) -> &AgentBase {
        &self.base
    }

    async fn perform(&self, task: &Task) -> Result<Metadata> {
        let goal = task
            .input
            .get("goal")
            .and_then(|v| v.as_str())
            .unwrap_or(&task.description)
            .to_string();

        let mut output = Metadata::new();
        output.insert("action".to_string(), json!("plan"));
        output.insert("goal".to_string(), json!(goal));
        output.insert(
            "steps".to_string(),
            json!([
                "Step 1: Analyze input",
                "Step 2: Create plan",
                "Step 3: Execute plan"
            ]),
        );
        output.insert("status".to_string(), json!("success"));
        Ok(output)
    }
}
