//! Workstation operator CLI

use anyhow::{anyhow, Result};
use clap::{Arg, Command};
use std::sync::Arc;
use std::time::Duration;
use workstation_agents::{default_fleet, AgentRegistry};
use workstation_common::metrics::DefaultMetricsCollector;
use workstation_common::{Config, Metadata, Task, TaskFilter, TaskPriority};
use workstation_orchestrator::{Orchestrator, TaskQueue};
use workstation_workflow::{templates, WorkflowEngine, WorkflowExecutor};

struct Services {
    orchestrator: Arc<Orchestrator>,
    executor: WorkflowExecutor,
    engine: Arc<WorkflowEngine>,
}

fn build_services(config: &Config) -> Result<Services> {
    let metrics = Arc::new(DefaultMetricsCollector);
    let queue = Arc::new(TaskQueue::new(
        config.orchestrator.max_concurrent_agents,
        config.orchestrator.completed_retention,
    ));
    let registry = Arc::new(AgentRegistry::new());
    for agent in default_fleet() {
        registry.register(agent);
    }

    let orchestrator = Arc::new(Orchestrator::new(
        queue,
        registry,
        config.orchestrator.clone(),
        metrics.clone(),
    ));

    let engine = Arc::new(WorkflowEngine::new(config.workflow.clone(), metrics));
    for template in templates::builtin_templates() {
        engine.register_workflow(template)?;
    }
    let executor = WorkflowExecutor::new(Arc::clone(&engine));

    Ok(Services {
        orchestrator,
        executor,
        engine,
    })
}

fn parse_parameters(raw: Option<&String>) -> Result<Metadata> {
    match raw {
        None => Ok(Metadata::new()),
        Some(raw) => match serde_json::from_str::<serde_json::Value>(raw)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(anyhow!("parameters must be a JSON object")),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let app = Command::new("workstation-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Workstation backend CLI")
        .subcommand(Command::new("status").about("Show orchestrator status"))
        .subcommand(
            Command::new("task")
                .about("Task management")
                .subcommand(Command::new("list").about("List tasks"))
                .subcommand(
                    Command::new("submit")
                        .about("Submit a task and wait for it to finish")
                        .arg(Arg::new("type").required(true).help("Task type (navigate, extract, ...)"))
                        .arg(Arg::new("description").required(true).help("Task description"))
                        .arg(
                            Arg::new("priority")
                                .short('p')
                                .long("priority")
                                .default_value("medium")
                                .help("urgent | high | medium | low"),
                        )
                        .arg(
                            Arg::new("input")
                                .short('i')
                                .long("input")
                                .help("Task input as a JSON object"),
                        ),
                ),
        )
        .subcommand(
            Command::new("workflow")
                .about("Workflow management")
                .subcommand(Command::new("list").about("List registered workflows"))
                .subcommand(
                    Command::new("run")
                        .about("Execute a workflow")
                        .arg(Arg::new("id").required(true).help("Workflow id"))
                        .arg(
                            Arg::new("parameters")
                                .short('P')
                                .long("parameters")
                                .help("Initial context as a JSON object"),
                        ),
                ),
        );

    let matches = app.get_matches();
    let config = Config::load().map_err(|e| anyhow!("failed to load config: {e}"))?;
    let services = build_services(&config)?;

    match matches.subcommand() {
        Some(("status", _)) => {
            let stats = services.orchestrator.stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Some(("task", task_matches)) => match task_matches.subcommand() {
            Some(("list", _)) => {
                let tasks = services.orchestrator.list_tasks(TaskFilter::All, 100);
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            }
            Some(("submit", submit_matches)) => {
                let task_type = submit_matches.get_one::<String>("type").unwrap();
                let description = submit_matches.get_one::<String>("description").unwrap();
                let priority: TaskPriority = serde_json::from_value(serde_json::Value::String(
                    submit_matches.get_one::<String>("priority").unwrap().clone(),
                ))
                .map_err(|_| anyhow!("invalid priority"))?;
                let input = parse_parameters(submit_matches.get_one::<String>("input"))?;

                services.orchestrator.start();
                let task_id = services
                    .orchestrator
                    .submit(Task::new(task_type, description, priority, input));

                // Poll until the task reaches a terminal status
                loop {
                    if let Some(snapshot) = services.orchestrator.task_status(&task_id) {
                        if snapshot.status.is_terminal() {
                            println!("{}", serde_json::to_string_pretty(&snapshot)?);
                            break;
                        }
                    }
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                services.orchestrator.stop().await;
            }
            _ => println!("Use 'task list' or 'task submit <type> <description>'"),
        },
        Some(("workflow", workflow_matches)) => match workflow_matches.subcommand() {
            Some(("list", _)) => {
                for id in services.engine.workflow_ids() {
                    println!("{id}");
                }
            }
            Some(("run", run_matches)) => {
                let workflow_id = run_matches.get_one::<String>("id").unwrap();
                let parameters = parse_parameters(run_matches.get_one::<String>("parameters"))?;
                let summary = services.executor.execute(workflow_id, parameters, None).await;
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            _ => println!("Use 'workflow list' or 'workflow run <id>'"),
        },
        _ => {
            println!("Workstation backend CLI");
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
