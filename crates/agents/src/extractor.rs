//! Extractor agent implementation

use async_trait::async_trait;
use serde_json::{json, Value};
use workstation_common::{AgentType, Metadata, Result, Task};
use workstation_core::agent::{Agent, AgentBase, AgentCapabilities};

/// Agent specialized in extracting data from pages
pub struct ExtractorAgent {
    base: AgentBase,
}

impl ExtractorAgent {
    pub fn new() -> Self {
        Self {
            base: AgentBase::new(
                AgentType::Extractor,
                "Extractor Agent",
                "Extracts structured data from web pages",
                AgentCapabilities {
                    can_extract: true,
                    ..AgentCapabilities::default()
                },
            ),
        }
    }
}

impl Default for ExtractorAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ExtractorAgent {
    fn base(&self) -> &AgentBase {
        &self.base
    }

    async fn perform(&self, task: &Task) -> Result<Metadata> {
        let selector = task.input.get("selector").cloned().unwrap_or(Value::Null);
        let extract_type = task
            .input
            .get("extract_type")
            .cloned()
            .unwrap_or_else(|| json!("text"));

        let mut output = Metadata::new();
        output.insert("action".to_string(), json!("extract"));
        output.insert("selector".to_string(), selector);
        output.insert("extract_type".to_string(), extract_type);
        output.insert("data".to_string(), json!([]));
        output.insert("status".to_string(), json!("success"));
        Ok(output)
    }
}
