//! Metrics collection and reporting

use crate::error::Result;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram,
    register_histogram_vec, CounterVec, Gauge, GaugeVec, Histogram, HistogramVec, Registry,
};

/// Global metrics registry
pub static METRICS_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Submitted task counter
pub static TASKS_SUBMITTED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "workstation_tasks_submitted_total",
        "Total number of tasks submitted",
        &["priority"]
    )
    .unwrap()
});

/// Terminated task counter
pub static TASKS_TERMINATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "workstation_tasks_terminated_total",
        "Total number of tasks reaching a terminal status",
        &["status"]
    )
    .unwrap()
});

/// Task retry counter
pub static TASK_RETRIES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "workstation_task_retries_total",
        "Total number of task retry attempts",
        &["type"]
    )
    .unwrap()
});

/// Task execution duration
pub static TASK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "workstation_task_duration_seconds",
        "Task execution duration in seconds",
        &["type"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]
    )
    .unwrap()
});

/// Queue depth per priority lane
pub static QUEUE_DEPTH: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "workstation_queue_depth",
        "Queued tasks per priority lane",
        &["priority"]
    )
    .unwrap()
});

/// In-flight task gauge
pub static ACTIVE_TASKS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("workstation_active_tasks", "Currently in-flight tasks").unwrap()
});

/// Workflow execution counter
pub static WORKFLOWS_EXECUTED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "workstation_workflows_executed_total",
        "Total number of workflow executions",
        &["status"]
    )
    .unwrap()
});

/// Workflow execution duration
pub static WORKFLOW_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "workstation_workflow_duration_seconds",
        "Workflow execution duration in seconds",
        vec![0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]
    )
    .unwrap()
});

/// Workflow step counter
pub static WORKFLOW_STEPS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "workstation_workflow_steps_total",
        "Total workflow steps executed",
        &["type", "status"]
    )
    .unwrap()
});

/// Initialize all metrics
pub fn init_metrics() -> Result<()> {
    METRICS_REGISTRY.register(Box::new(TASKS_SUBMITTED.clone()))?;
    METRICS_REGISTRY.register(Box::new(TASKS_TERMINATED.clone()))?;
    METRICS_REGISTRY.register(Box::new(TASK_RETRIES.clone()))?;
    METRICS_REGISTRY.register(Box::new(TASK_DURATION.clone()))?;
    METRICS_REGISTRY.register(Box::new(QUEUE_DEPTH.clone()))?;
    METRICS_REGISTRY.register(Box::new(ACTIVE_TASKS.clone()))?;
    METRICS_REGISTRY.register(Box::new(WORKFLOWS_EXECUTED.clone()))?;
    METRICS_REGISTRY.register(Box::new(WORKFLOW_DURATION.clone()))?;
    METRICS_REGISTRY.register(Box::new(WORKFLOW_STEPS.clone()))?;

    Ok(())
}

impl From<prometheus::Error> for crate::error::Error {
    fn from(err: prometheus::Error) -> Self {
        crate::error::Error::Internal(err.to_string())
    }
}

/// Metrics collector trait
pub trait MetricsCollector: Send + Sync {
    /// Record a task submission
    fn record_submitted(&self, priority: &str);

    /// Record a task reaching a terminal status
    fn record_terminated(&self, task_type: &str, status: &str, duration_secs: f64);

    /// Record a retry attempt
    fn record_retry(&self, task_type: &str);

    /// Update queue depth for a lane
    fn set_queue_depth(&self, priority: &str, depth: usize);

    /// Update the in-flight gauge
    fn set_active_tasks(&self, count: usize);

    /// Record a workflow execution
    fn record_workflow(&self, status: &str, duration_secs: f64);

    /// Record a workflow step
    fn record_step(&self, step_type: &str, status: &str);
}

/// Default metrics collector implementation
#[derive(Clone, Default)]
pub struct DefaultMetricsCollector;

impl MetricsCollector for DefaultMetricsCollector {
    fn record_submitted(&self, priority: &str) {
        TASKS_SUBMITTED.with_label_values(&[priority]).inc();
    }

    fn record_terminated(&self, task_type: &str, status: &str, duration_secs: f64) {
        TASKS_TERMINATED.with_label_values(&[status]).inc();
        TASK_DURATION
            .with_label_values(&[task_type])
            .observe(duration_secs);
    }

    fn record_retry(&self, task_type: &str) {
        TASK_RETRIES.with_label_values(&[task_type]).inc();
    }

    fn set_queue_depth(&self, priority: &str, depth: usize) {
        #[allow(clippy::cast_precision_loss)]
        QUEUE_DEPTH.with_label_values(&[priority]).set(depth as f64);
    }

    fn set_active_tasks(&self, count: usize) {
        #[allow(clippy::cast_precision_loss)]
        ACTIVE_TASKS.set(count as f64);
    }

    fn record_workflow(&self, status: &str, duration_secs: f64) {
        WORKFLOWS_EXECUTED.with_label_values(&[status]).inc();
        WORKFLOW_DURATION.observe(duration_secs);
    }

    fn record_step(&self, step_type: &str, status: &str) {
        WORKFLOW_STEPS.with_label_values(&[step_type, status]).inc();
    }
}
