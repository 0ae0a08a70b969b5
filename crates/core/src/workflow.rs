//! Workflow definition model
//!
//! A workflow is a named static DAG of typed steps. Step configs are
//! arbitrary JSON trees whose string values may reference the execution
//! context with a `$` prefix. Definitions accept both snake_case and the
//! legacy camelCase field spellings on input.

use serde::{Deserialize, Serialize};
use workstation_common::Metadata;

/// A named static DAG of steps with a shared context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Entry step; defaults to the first listed step
    #[serde(default, alias = "initialStep", skip_serializing_if = "Option::is_none")]
    pub initial_step: Option<String>,
    pub steps: Vec<StepDefinition>,
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            initial_step: None,
            steps: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn starting_at(mut self, step_id: impl Into<String>) -> Self {
        self.initial_step = Some(step_id.into());
        self
    }

    pub fn step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    /// Resolve the entry step id
    pub fn initial_step_id(&self) -> Option<&str> {
        self.initial_step
            .as_deref()
            .or_else(|| self.steps.first().map(|s| s.id.as_str()))
    }

    pub fn find_step(&self, step_id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == step_id)
    }
}

/// A node of the workflow DAG
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default)]
    pub config: Metadata,
    /// Successors executed after this step; more than one fans out in parallel
    #[serde(default, alias = "nextSteps", skip_serializing_if = "Vec::is_empty")]
    pub next_steps: Vec<String>,
    #[serde(default, alias = "onSuccess", skip_serializing_if = "Option::is_none")]
    pub on_success: Option<String>,
    #[serde(default, alias = "onError", skip_serializing_if = "Option::is_none")]
    pub on_error: Option<String>,
    #[serde(default, alias = "maxRetries")]
    pub max_retries: u32,
}

impl StepDefinition {
    pub fn new(id: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: id.into(),
            step_type,
            config: Metadata::new(),
            next_steps: Vec::new(),
            on_success: None,
            on_error: None,
            max_retries: 0,
        }
    }

    /// Set the config tree. Accepts any JSON object.
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = config {
            self.config = map;
        }
        self
    }

    pub fn then(mut self, next_steps: &[&str]) -> Self {
        self.next_steps = next_steps.iter().map(|s| (*s).to_string()).collect();
        self
    }

    pub fn on_success(mut self, step_id: impl Into<String>) -> Self {
        self.on_success = Some(step_id.into());
        self
    }

    pub fn on_error(mut self, step_id: impl Into<String>) -> Self {
        self.on_error = Some(step_id.into());
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Step type, dispatched by the workflow engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Navigate,
    Extract,
    Action,
    Analyze,
    Condition,
    Loop,
    Custom,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Extract => "extract",
            Self::Action => "action",
            Self::Analyze => "analyze",
            Self::Condition => "condition",
            Self::Loop => "loop",
            Self::Custom => "custom",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initial_step_defaults_to_first() {
        let workflow = WorkflowDefinition::new("wf", "Workflow")
            .step(StepDefinition::new("a", StepType::Navigate))
            .step(StepDefinition::new("b", StepType::Extract));
        assert_eq!(workflow.initial_step_id(), Some("a"));

        let workflow = workflow.starting_at("b");
        assert_eq!(workflow.initial_step_id(), Some("b"));
    }

    #[test]
    fn deserializes_legacy_camel_case() {
        let json = json!({
            "id": "wf",
            "name": "Workflow",
            "initialStep": "first",
            "steps": [
                {
                    "id": "first",
                    "type": "navigate",
                    "config": {"url": "$target"},
                    "nextSteps": ["second"],
                    "maxRetries": 2
                },
                {
                    "id": "second",
                    "type": "condition",
                    "config": {"condition": "len(items) > 0"},
                    "onSuccess": "first",
                    "onError": "first"
                }
            ]
        });

        let workflow: WorkflowDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(workflow.initial_step.as_deref(), Some("first"));
        let first = workflow.find_step("first").unwrap();
        assert_eq!(first.next_steps, vec!["second".to_string()]);
        assert_eq!(first.max_retries, 2);
        let second = workflow.find_step("second").unwrap();
        assert_eq!(second.step_type, StepType::Condition);
        assert_eq!(second.on_success.as_deref(), Some("first"));
    }

    #[test]
    fn step_builder_sets_config() {
        let step = StepDefinition::new("nav", StepType::Navigate)
            .with_config(json!({"url": "$site1Url"}))
            .then(&["extract"]);
        assert_eq!(step.config.get("url").unwrap(), "$site1Url");
        assert_eq!(step.next_steps.len(), 1);
    }
}
