//! Workstation backend main entry point
//!
//! Builds the service graph (registry, queue, orchestrator, workflow engine)
//! at process init and shuts it down explicitly on ctrl-c.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use workstation_agents::{default_fleet, AgentRegistry};
use workstation_common::metrics::{init_metrics, DefaultMetricsCollector};
use workstation_common::{telemetry, Config};
use workstation_orchestrator::{Orchestrator, TaskQueue};
use workstation_workflow::{templates, InMemoryExecutionStore, WorkflowEngine};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?;

    // Validate configuration
    if let Err(errors) = config.validate() {
        for error in errors {
            eprintln!("config error: {error}");
        }
        std::process::exit(1);
    }

    // Initialize telemetry and metrics
    telemetry::init_telemetry(&config.observability)?;
    if config.observability.metrics_enabled {
        init_metrics()?;
    }

    info!("starting workstation backend v{}", env!("CARGO_PKG_VERSION"));

    let metrics = Arc::new(DefaultMetricsCollector);

    // Agent registry seeded with the default fleet
    let registry = Arc::new(AgentRegistry::new());
    for agent in default_fleet() {
        registry.register(agent);
    }

    // Task orchestration
    let queue = Arc::new(TaskQueue::new(
        config.orchestrator.max_concurrent_agents,
        config.orchestrator.completed_retention,
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&queue),
        Arc::clone(&registry),
        config.orchestrator.clone(),
        metrics.clone(),
    ));
    orchestrator.start();

    // Workflow engine with built-in templates
    let store = Arc::new(InMemoryExecutionStore::new());
    let engine = Arc::new(
        WorkflowEngine::new(config.workflow.clone(), metrics).with_store(store),
    );
    for template in templates::builtin_templates() {
        engine.register_workflow(template)?;
    }

    info!(
        agents = registry.stats().total_agents,
        workflows = engine.workflow_ids().len(),
        "backend started"
    );

    // Run until interrupted
    tokio::signal::ctrl_c().await?;

    info!("shutting down workstation backend");
    orchestrator.stop().await;
    info!("backend shut down");

    Ok(())
}
