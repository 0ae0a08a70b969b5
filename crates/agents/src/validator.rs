//! Validator agent implementation

use async_trait::async_trait;
use serde_json::{json, Value};
use workstation_common::{AgentType, Metadata, Result, Task};
use workstation_core::agent::{Agent, AgentBase, AgentCapabilities};

/// Agent specialized in validating action outcomes
pub struct ValidatorAgent {
    base: AgentBase,
}

impl ValidatorAgent {
    pub fn new() -> Self {
        Self {
            base: AgentBase::new(
                AgentType::Validator,
                "Validator Agent",
                "Validates page state and action outcomes",
                AgentCapabilities {
                    can_validate: true,
                    ..AgentCapabilities::default()
                },
            ),
        }
    }
}

impl Default for ValidatorAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ValidatorAgent {
    fn base(&self) -> &AgentBase {
        &self.base
    }

    async fn perform(&self, task: &Task) -> Result<Metadata> {
        let expected = task.input.get("expected").cloned().unwrap_or(Value::Null);

        let mut output = Metadata::new();
        output.insert("action".to_string(), json!("validate"));
        output.insert("expected".to_string(), expected);
        output.insert("valid".to_string(), json!(true));
        output.insert("status".to_string(), json!("success"));
        Ok(output)
    }
}
