#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Task orchestration for the Workstation backend
//!
//! Runs a pool of identical worker loops that pull tasks off the priority
//! queue, route them to a compatible agent, enforce per-task timeouts, and
//! retry failures with backoff.

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use workstation_agents::{AgentRegistry, RegistryStats};
use workstation_common::{
    config::OrchestratorConfig,
    metrics::MetricsCollector,
    AgentType, Task, TaskFilter, TaskId, TaskRef, TaskSnapshot, TaskStatus,
};
use workstation_core::agent::Agent;

pub mod queue;

pub use queue::{QueueStats, TaskQueue};

/// Sleep between polls when the queue is empty or at capacity
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Retry backoff schedule in seconds; attempts beyond the schedule reuse the
/// last entry
const RETRY_BACKOFF_SECS: [u64; 5] = [1, 5, 15, 30, 60];

/// Map a task type to the agent type that handles it. Unknown types fall
/// through to the executor, the catch-all.
pub fn route_agent_type(task_type: &str) -> AgentType {
    match task_type {
        "navigate" => AgentType::Navigator,
        "plan" => AgentType::Planner,
        "validate" => AgentType::Validator,
        "extract" => AgentType::Extractor,
        "analyze" => AgentType::Analyzer,
        _ => AgentType::Executor,
    }
}

struct OrchestratorRuntime {
    running: bool,
    workers: Vec<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
}

/// Composite statistics for the external status surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub running: bool,
    pub workers: usize,
    pub queue: QueueStats,
    pub agents: RegistryStats,
}

/// Main orchestration engine: routes tasks to agents, manages the task
/// lifecycle, and handles retries and failures.
pub struct Orchestrator {
    queue: Arc<TaskQueue>,
    registry: Arc<AgentRegistry>,
    config: OrchestratorConfig,
    metrics: Arc<dyn MetricsCollector>,
    runtime: Mutex<OrchestratorRuntime>,
}

impl Orchestrator {
    pub fn new(
        queue: Arc<TaskQueue>,
        registry: Arc<AgentRegistry>,
        config: OrchestratorConfig,
        metrics: Arc<dyn MetricsCollector>,
    ) -> Self {
        Self {
            queue,
            registry,
            config,
            metrics,
            runtime: Mutex::new(OrchestratorRuntime {
                running: false,
                workers: Vec::new(),
                shutdown: None,
            }),
        }
    }

    /// Spawn the worker pool. No-op if already running.
    pub fn start(&self) {
        let mut runtime = self.runtime.lock();
        if runtime.running {
            warn!("orchestrator already running");
            return;
        }

        let (shutdown_tx, _) = watch::channel(false);
        let num_workers = self.config.max_concurrent_agents;
        for worker_id in 0..num_workers {
            let worker = Worker {
                worker_id,
                queue: Arc::clone(&self.queue),
                registry: Arc::clone(&self.registry),
                config: self.config.clone(),
                metrics: Arc::clone(&self.metrics),
            };
            let shutdown_rx = shutdown_tx.subscribe();
            runtime.workers.push(tokio::spawn(worker.run(shutdown_rx)));
        }

        runtime.shutdown = Some(shutdown_tx);
        runtime.running = true;
        info!(workers = num_workers, "orchestrator started");
    }

    /// Cooperatively cancel all workers and await their completion. Tasks
    /// mid-flight are reported failed; queued tasks stay queued.
    pub async fn stop(&self) {
        let (workers, shutdown) = {
            let mut runtime = self.runtime.lock();
            if !runtime.running {
                return;
            }
            runtime.running = false;
            (std::mem::take(&mut runtime.workers), runtime.shutdown.take())
        };

        info!("stopping orchestrator");
        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(true);
        }
        for worker in workers {
            let _ = worker.await;
        }
        info!("orchestrator stopped");
    }

    /// Enqueue a new task for execution and return its id
    #[instrument(skip(self, task), fields(task_type = %task.task_type))]
    pub fn submit(&self, task: Task) -> TaskId {
        let task_id = task.id.clone();
        let description = task.description.clone();
        self.metrics.record_submitted(task.priority.as_str());
        self.queue.enqueue(&task.into_ref());
        info!(task_id = %task_id, "task submitted: {description}");
        task_id
    }

    /// Flattened task view, or `None` once the task has been evicted from
    /// the terminated window
    pub fn task_status(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.queue.get(task_id).map(|t| TaskSnapshot::from(&*t.read()))
    }

    pub fn cancel(&self, task_id: &str) -> bool {
        let cancelled = self.queue.cancel(task_id);
        if cancelled {
            info!(task_id, "task cancelled");
        }
        cancelled
    }

    /// List tasks matching the filter; `limit` is clamped to 1..=500
    pub fn list_tasks(&self, filter: TaskFilter, limit: usize) -> Vec<TaskSnapshot> {
        let limit = limit.clamp(1, 500);
        let mut tasks = Vec::new();
        if matches!(filter, TaskFilter::Active | TaskFilter::All) {
            tasks.extend(self.queue.active_tasks());
        }
        if matches!(filter, TaskFilter::Completed | TaskFilter::All) {
            tasks.extend(self.queue.completed_tasks(limit));
        }
        tasks.truncate(limit);
        tasks
            .iter()
            .map(|t| TaskSnapshot::from(&*t.read()))
            .collect()
    }

    pub fn stats(&self) -> OrchestratorStats {
        let runtime = self.runtime.lock();
        OrchestratorStats {
            running: runtime.running,
            workers: runtime.workers.len(),
            queue: self.queue.stats(),
            agents: self.registry.stats(),
        }
    }
}

/// One worker loop of the pool
struct Worker {
    worker_id: usize,
    queue: Arc<TaskQueue>,
    registry: Arc<AgentRegistry>,
    config: OrchestratorConfig,
    metrics: Arc<dyn MetricsCollector>,
}

impl Worker {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        debug!(worker_id = self.worker_id, "worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let Some(task) = self.queue.dequeue() else {
                tokio::select! {
                    () = tokio::time::sleep(IDLE_POLL) => {}
                    _ = shutdown.changed() => {}
                }
                continue;
            };

            self.process(task, &mut shutdown).await;
        }

        debug!(worker_id = self.worker_id, "worker stopped");
    }

    async fn process(&self, task: TaskRef, shutdown: &mut watch::Receiver<bool>) {
        let (task_id, task_type) = {
            let t = task.read();
            (t.id.clone(), t.task_type.clone())
        };

        let agent_type = route_agent_type(&task_type);
        let Some(agent) = self.claim_agent(agent_type, &task_id) else {
            // No agent free right now; put the task back on its lane. Higher
            // priorities still win the next dequeue, so nothing is starved.
            warn!(task_id = %task_id, agent_type = agent_type.as_str(), "no agent available, requeueing");
            self.queue.enqueue(&task);
            tokio::select! {
                () = tokio::time::sleep(IDLE_POLL) => {}
                _ = shutdown.changed() => {}
            }
            return;
        };

        {
            let mut t = task.write();
            t.status = TaskStatus::Initializing;
            t.assigned_agent_id = Some(agent.base().id().to_string());
        }

        agent.base().mark_running();
        {
            let mut t = task.write();
            t.status = TaskStatus::Running;
            t.started_at = Some(Utc::now());
        }
        debug!(worker_id = self.worker_id, task_id = %task_id, agent_id = agent.base().id(), "executing task");

        let snapshot = task.read().clone();
        let started = tokio::time::Instant::now();
        // A buggy agent must not take the worker down with it; a panic is
        // recorded as an ordinary execution failure
        let execution = std::panic::AssertUnwindSafe(agent.perform(&snapshot))
            .catch_unwind()
            .map(|result| {
                result.unwrap_or_else(|_| {
                    Err(workstation_common::Error::Agent(
                        "agent panicked during execution".to_string(),
                    ))
                })
            });
        let outcome = tokio::select! {
            result = tokio::time::timeout(self.config.agent_timeout(), execution) => Some(result),
            _ = shutdown.changed() => None,
        };
        agent.base().release();

        match outcome {
            None => {
                // Interrupted mid-flight by stop()
                {
                    let mut t = task.write();
                    t.status = TaskStatus::Failed;
                    t.error = Some("cancelled: orchestrator stopped".to_string());
                    t.completed_at = Some(Utc::now());
                }
                self.queue.complete(&task_id);
                self.metrics
                    .record_terminated(&task_type, "failed", started.elapsed().as_secs_f64());
            }
            Some(Err(_elapsed)) => {
                error!(task_id = %task_id, "task timed out");
                self.handle_failure(&task, "Task execution timeout", shutdown)
                    .await;
            }
            Some(Ok(Err(err))) => {
                error!(task_id = %task_id, error = %err, "task failed");
                self.handle_failure(&task, &err.to_string(), shutdown).await;
            }
            Some(Ok(Ok(output))) => {
                let was_cancelled = {
                    let mut t = task.write();
                    if t.status == TaskStatus::Cancelled {
                        true
                    } else {
                        t.output = Some(output);
                        t.status = TaskStatus::Completed;
                        t.completed_at = Some(Utc::now());
                        false
                    }
                };
                self.queue.complete(&task_id);
                if was_cancelled {
                    debug!(task_id = %task_id, "discarding output of cancelled task");
                } else {
                    info!(task_id = %task_id, "task completed");
                    self.metrics.record_terminated(
                        &task_type,
                        "completed",
                        started.elapsed().as_secs_f64(),
                    );
                }
            }
        }

        self.publish_queue_gauges();
    }

    /// Atomically claim an idle agent of the given type
    fn claim_agent(&self, agent_type: AgentType, task_id: &str) -> Option<Arc<dyn Agent>> {
        self.registry
            .by_type(agent_type)
            .into_iter()
            .find(|agent| agent.base().try_claim(task_id))
    }

    /// Retry with backoff, or terminate the task failed once the retry
    /// budget is spent. The backoff sleep runs on this worker on purpose:
    /// sustained failure reduces effective concurrency and acts as
    /// backpressure.
    async fn handle_failure(
        &self,
        task: &TaskRef,
        error: &str,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        let (task_id, task_type, retry_count) = {
            let mut t = task.write();
            t.retry_count += 1;
            (t.id.clone(), t.task_type.clone(), t.retry_count)
        };

        if retry_count <= self.config.task_retry_limit {
            let index = usize::try_from(retry_count - 1)
                .unwrap_or(0)
                .min(RETRY_BACKOFF_SECS.len() - 1);
            let delay = Duration::from_secs(RETRY_BACKOFF_SECS[index]);
            info!(task_id = %task_id, attempt = retry_count, delay_secs = delay.as_secs(), "retrying task");
            self.metrics.record_retry(&task_type);

            tokio::select! {
                () = tokio::time::sleep(delay) => {
                    self.queue.enqueue(task);
                }
                _ = shutdown.changed() => {
                    self.queue.fail(&task_id, "cancelled: orchestrator stopped during retry backoff");
                }
            }
        } else {
            error!(task_id = %task_id, attempts = retry_count, "task failed after retries");
            self.queue.fail(&task_id, error);
            self.metrics.record_terminated(&task_type, "failed", 0.0);
        }
    }

    fn publish_queue_gauges(&self) {
        let stats = self.queue.stats();
        for (priority, depth) in &stats.queued {
            self.metrics.set_queue_depth(priority, *depth);
        }
        self.metrics.set_active_tasks(stats.active_tasks);
    }
}
