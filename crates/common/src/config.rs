//! Configuration management

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub orchestrator: OrchestratorConfig,
    pub workflow: WorkflowConfig,
    pub observability: ObservabilityConfig,
}

/// Orchestrator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    /// Worker count and in-flight task ceiling
    pub max_concurrent_agents: usize,
    pub agent_timeout_seconds: u64,
    pub task_retry_limit: u32,
    /// Bound on the terminated-task window; oldest entries are evicted
    pub completed_retention: usize,
}

impl OrchestratorConfig {
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_seconds)
    }
}

/// Workflow engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Per-step cap on waiting for a predecessor to finish
    pub step_wait_timeout_seconds: u64,
    pub step_poll_interval_ms: u64,
}

impl WorkflowConfig {
    pub fn step_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.step_wait_timeout_seconds)
    }

    pub fn step_poll_interval(&self) -> Duration {
        Duration::from_millis(self.step_poll_interval_ms)
    }
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
    pub metrics_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Log format
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Config {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder()
            .set_default("orchestrator.max_concurrent_agents", 20)?
            .set_default("orchestrator.agent_timeout_seconds", 300)?
            .set_default("orchestrator.task_retry_limit", 3)?
            .set_default("orchestrator.completed_retention", 1000)?
            .set_default("workflow.step_wait_timeout_seconds", 300)?
            .set_default("workflow.step_poll_interval_ms", 500)?
            .set_default("observability.metrics_enabled", true)?
            .set_default("observability.metrics_port", 9090)?
            .set_default("observability.log_level", "info")?
            .set_default("observability.log_format", "pretty")?;

        // Load from config file if exists
        if Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("WORKSTATION")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.orchestrator.max_concurrent_agents == 0 {
            errors.push("orchestrator.max_concurrent_agents must be greater than 0".to_string());
        }

        if self.orchestrator.agent_timeout_seconds == 0 {
            errors.push("orchestrator.agent_timeout_seconds must be greater than 0".to_string());
        }

        if self.orchestrator.completed_retention == 0 {
            errors.push("orchestrator.completed_retention must be greater than 0".to_string());
        }

        if self.workflow.step_poll_interval_ms == 0 {
            errors.push("workflow.step_poll_interval_ms must be greater than 0".to_string());
        }

        if self.workflow.step_wait_timeout_seconds == 0 {
            errors.push("workflow.step_wait_timeout_seconds must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig {
                max_concurrent_agents: 20,
                agent_timeout_seconds: 300,
                task_retry_limit: 3,
                completed_retention: 1000,
            },
            workflow: WorkflowConfig {
                step_wait_timeout_seconds: 300,
                step_poll_interval_ms: 500,
            },
            observability: ObservabilityConfig {
                metrics_enabled: true,
                metrics_port: 9090,
                log_level: "info".to_string(),
                log_format: LogFormat::Pretty,
            },
        }
    }
}
