//! Analyzer agent implementation

use async_trait::async_trait;
use serde_json::{json, Value};
use workstation_common::{AgentType, Metadata, Result, Task};
use workstation_core::agent::{Agent, AgentBase, AgentCapabilities};

/// Agent specialized in analyzing collected data
pub struct AnalyzerAgent {
    base: AgentBase,
}

impl AnalyzerAgent {
    pub fn new() -> Self {
        Self {
            base: AgentBase::new(
                AgentType::Analyzer,
                "Analyzer Agent",
                "Analyzes and summarizes collected data",
                AgentCapabilities {
                    can_analyze: true,
                    supports_llm: true,
                    ..AgentCapabilities::default()
                },
            ),
        }
    }
}

impl Default for AnalyzerAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for AnalyzerAgent {
    fn base(&self) -> &AgentBase {
        &self.base
    }

    async fn perform(&self, task: &Task) -> Result<Metadata> {
        let analysis_type = task
            .input
            .get("analysis_type")
            .cloned()
            .unwrap_or_else(|| json!("summary"));
        let data = task.input.get("data").cloned().unwrap_or(Value::Null);

        let mut output = Metadata::new();
        output.insert("action".to_string(), json!("analyze"));
        output.insert("analysis_type".to_string(), analysis_type);
        output.insert("result".to_string(), data);
        output.insert("status".to_string(), json!("success"));
        Ok(output)
    }
}
