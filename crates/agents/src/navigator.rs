//! Navigator agent implementation

use async_trait::async_trait;
use serde_json::{json, Value};
use workstation_common::{AgentType, Metadata, Result, Task};
use workstation_core::agent::{Agent, AgentBase, AgentCapabilities};

/// Agent specialized in web navigation and element location
pub struct NavigatorAgent {
    base: AgentBase,
}

impl NavigatorAgent {
    pub fn new() -> Self {
        Self {
            base: AgentBase::new(
                AgentType::Navigator,
                "Navigator Agent",
                "Navigates web pages and locates elements",
                AgentCapabilities {
                    can_navigate: true,
                    supports_llm: true,
                    ..AgentCapabilities::default()
                },
            ),
        }
    }
}

impl Default for NavigatorAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for NavigatorAgent {
    fn base(&self) -> &AgentBase {
        &self.base
    }

    async fn perform(&self, task: &Task) -> Result<Metadata> {
        let url = task.input.get("url").cloned().unwrap_or(Value::Null);
        let elements = task
            .input
            .get("selector")
            .cloned()
            .unwrap_or_else(|| json!([]));

        let mut output = Metadata::new();
        output.insert("action".to_string(), json!("navigate"));
        output.insert("url".to_string(), url);
        output.insert("elements_found".to_string(), elements);
        output.insert("status".to_string(), json!("success"));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workstation_common::TaskPriority;

    #[tokio::test]
    async fn navigation_echoes_url() {
        let agent = NavigatorAgent::new();
        let mut input = Metadata::new();
        input.insert("url".to_string(), json!("https://example.com"));
        let task = Task::new("navigate", "open page", TaskPriority::Medium, input);

        let output = agent.perform(&task).await.unwrap();
        assert_eq!(output.get("action").unwrap(), "navigate");
        assert_eq!(output.get("url").unwrap(), "https://example.com");
        assert_eq!(output.get("status").unwrap(), "success");
    }
}
