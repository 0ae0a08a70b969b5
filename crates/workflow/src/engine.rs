//! Workflow engine: DAG execution with conditional branching, parallel
//! fan-out, per-step retries, and variable resolution

use crate::expr;
use crate::state::{ExecutionRef, StepState, StepStatus, WorkflowState, WorkflowStatus};
use crate::store::{ExecutionRecord, ExecutionStore};
use chrono::Utc;
use futures::future::{try_join_all, BoxFuture};
use parking_lot::{Mutex, RwLock};
use petgraph::{algo::is_cyclic_directed, graph::DiGraph};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use workstation_common::{
    config::WorkflowConfig,
    metrics::MetricsCollector,
    Error, Metadata, Result,
};
use workstation_core::workflow::{StepDefinition, StepType, WorkflowDefinition};

/// Shared context of one execution, threaded through the recursive driver
struct ExecutionCtx {
    definition: WorkflowDefinition,
    state: ExecutionRef,
    /// Reverse dependencies: step id -> predecessors listing it in `next_steps`
    deps: HashMap<String, Vec<String>>,
    visited: Mutex<HashSet<String>>,
}

/// Workflow engine with a process-local definition registry
pub struct WorkflowEngine {
    workflows: RwLock<HashMap<String, WorkflowDefinition>>,
    executions: RwLock<HashMap<String, ExecutionRef>>,
    store: Option<Arc<dyn ExecutionStore>>,
    config: WorkflowConfig,
    metrics: Arc<dyn MetricsCollector>,
}

impl WorkflowEngine {
    pub fn new(config: WorkflowConfig, metrics: Arc<dyn MetricsCollector>) -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
            executions: RwLock::new(HashMap::new()),
            store: None,
            config,
            metrics,
        }
    }

    /// Attach an execution store. Persistence is best-effort; execution
    /// correctness never depends on it.
    pub fn with_store(mut self, store: Arc<dyn ExecutionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate and store a workflow definition
    pub fn register_workflow(&self, definition: WorkflowDefinition) -> Result<()> {
        Self::validate_definition(&definition)?;
        info!(workflow_id = %definition.id, "registered workflow");
        self.workflows
            .write()
            .insert(definition.id.clone(), definition);
        Ok(())
    }

    pub fn workflow(&self, workflow_id: &str) -> Option<WorkflowDefinition> {
        self.workflows.read().get(workflow_id).cloned()
    }

    pub fn workflow_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.workflows.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshot of a live or finished execution
    pub fn execution_state(&self, execution_id: &str) -> Option<WorkflowState> {
        self.executions
            .read()
            .get(execution_id)
            .map(|state| state.read().clone())
    }

    fn validate_definition(definition: &WorkflowDefinition) -> Result<()> {
        if definition.steps.is_empty() {
            return Err(Error::Validation(format!(
                "workflow {} has no steps",
                definition.id
            )));
        }

        let mut ids = HashSet::new();
        for step in &definition.steps {
            if !ids.insert(step.id.as_str()) {
                return Err(Error::Validation(format!(
                    "workflow {} has duplicate step id {}",
                    definition.id, step.id
                )));
            }
        }

        if let Some(initial) = &definition.initial_step {
            if !ids.contains(initial.as_str()) {
                return Err(Error::Validation(format!(
                    "workflow {} initial step {initial} does not exist",
                    definition.id
                )));
            }
        }

        for step in &definition.steps {
            let successors = step
                .next_steps
                .iter()
                .chain(step.on_success.iter())
                .chain(step.on_error.iter());
            for successor in successors {
                if !ids.contains(successor.as_str()) {
                    return Err(Error::Validation(format!(
                        "step {} references unknown step {successor}",
                        step.id
                    )));
                }
            }
        }

        // Cycles in the next_steps graph would deadlock predecessor waits
        let mut graph = DiGraph::<&str, ()>::new();
        let mut nodes = HashMap::new();
        for step in &definition.steps {
            nodes.insert(step.id.as_str(), graph.add_node(step.id.as_str()));
        }
        for step in &definition.steps {
            for next in &step.next_steps {
                graph.add_edge(nodes[step.id.as_str()], nodes[next.as_str()], ());
            }
        }
        if is_cyclic_directed(&graph) {
            return Err(Error::Validation(format!(
                "workflow {} contains a cycle in next_steps",
                definition.id
            )));
        }

        Ok(())
    }

    /// Build the reverse-dependency mapping: every step listing `T` in its
    /// `next_steps` becomes a predecessor of `T`.
    fn build_dag(definition: &WorkflowDefinition) -> HashMap<String, Vec<String>> {
        let mut dag: HashMap<String, Vec<String>> = HashMap::new();
        for step in &definition.steps {
            dag.entry(step.id.clone()).or_default();
            for next in &step.next_steps {
                dag.entry(next.clone()).or_default().push(step.id.clone());
            }
        }
        dag
    }

    /// Execute a workflow with the given initial context, running to a
    /// terminal status. Fails fast only when the workflow id is unknown;
    /// execution errors are reported through the returned state.
    #[instrument(skip(self, context))]
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        context: Metadata,
        user_id: Option<i64>,
    ) -> Result<WorkflowState> {
        let definition = self
            .workflow(workflow_id)
            .ok_or_else(|| Error::NotFound(format!("workflow not found: {workflow_id}")))?;

        let execution_id = Uuid::new_v4().to_string();
        let mut state = WorkflowState::new(execution_id.clone(), workflow_id, context);
        state.status = WorkflowStatus::Running;
        state.started_at = Some(Utc::now());
        let state: ExecutionRef = Arc::new(RwLock::new(state));

        self.executions
            .write()
            .insert(execution_id.clone(), Arc::clone(&state));

        if let Some(store) = &self.store {
            let record = ExecutionRecord::from_state(&state.read().clone(), user_id);
            if let Err(err) = store.insert_execution(&record).await {
                warn!(execution_id = %execution_id, error = %err, "failed to persist execution");
            }
        }

        info!(execution_id = %execution_id, workflow_id, "workflow execution started");
        let started = tokio::time::Instant::now();

        let ctx = ExecutionCtx {
            deps: Self::build_dag(&definition),
            definition,
            state: Arc::clone(&state),
            visited: Mutex::new(HashSet::new()),
        };

        let initial = ctx
            .definition
            .initial_step_id()
            .expect("validated workflow has steps")
            .to_string();

        let outcome = self.run_step(&ctx, &initial).await;

        {
            let mut s = state.write();
            match outcome {
                Ok(()) => {
                    s.status = WorkflowStatus::Completed;
                    let results = s.step_results();
                    s.result = Some(results);
                }
                Err(ref err) => {
                    error!(execution_id = %execution_id, error = %err, "workflow execution failed");
                    s.status = WorkflowStatus::Failed;
                    s.error_message = Some(err.to_string());
                }
            }
            s.completed_at = Some(Utc::now());
        }

        let snapshot = state.read().clone();
        self.metrics
            .record_workflow(snapshot.status.as_str(), started.elapsed().as_secs_f64());

        if let Some(store) = &self.store {
            let result = snapshot
                .result
                .clone()
                .or_else(|| Some(snapshot.step_results()));
            if let Err(err) = store
                .update_execution(
                    &execution_id,
                    snapshot.status,
                    result,
                    snapshot.error_message.clone(),
                    snapshot.completed_at,
                )
                .await
            {
                warn!(execution_id = %execution_id, error = %err, "failed to update persisted execution");
            }
        }

        Ok(snapshot)
    }

    /// Execute a step and its descendants, honoring predecessor waits.
    /// Converging branches execute each step id at most once per execution.
    fn run_step<'a>(&'a self, ctx: &'a ExecutionCtx, step_id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if !ctx.visited.lock().insert(step_id.to_string()) {
                return Ok(());
            }

            let Some(step) = ctx.definition.find_step(step_id) else {
                return Ok(());
            };

            if let Some(deps) = ctx.deps.get(step_id) {
                if !deps.is_empty() {
                    try_join_all(deps.iter().map(|dep| self.wait_for_step(ctx, dep))).await?;
                }
            }

            let successors = match self.execute_step(ctx, step).await {
                Ok(()) => Self::success_successors(step),
                Err(err) => match &step.on_error {
                    Some(fallback) => vec![fallback.clone()],
                    None => return Err(err),
                },
            };

            match successors.len() {
                0 => Ok(()),
                1 => self.run_step(ctx, &successors[0]).await,
                _ => {
                    try_join_all(
                        successors
                            .iter()
                            .map(|successor| self.run_step(ctx, successor)),
                    )
                    .await?;
                    Ok(())
                }
            }
        })
    }

    fn success_successors(step: &StepDefinition) -> Vec<String> {
        if !step.next_steps.is_empty() {
            step.next_steps.clone()
        } else if let Some(on_success) = &step.on_success {
            vec![on_success.clone()]
        } else {
            Vec::new()
        }
    }

    /// Poll until a predecessor reaches a terminal status, within the
    /// configured cap
    async fn wait_for_step(&self, ctx: &ExecutionCtx, step_id: &str) -> Result<()> {
        let timeout = self.config.step_wait_timeout();
        let interval = self.config.step_poll_interval();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            {
                let state = ctx.state.read();
                if let Some(step) = state.step_states.get(step_id) {
                    if step.status.is_terminal() {
                        return Ok(());
                    }
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Timeout(format!(
                    "step {step_id} did not complete within {}s",
                    timeout.as_secs()
                )));
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Run one step, retrying in place up to its retry budget
    async fn execute_step(&self, ctx: &ExecutionCtx, step: &StepDefinition) -> Result<()> {
        loop {
            let resolved = {
                let mut state = ctx.state.write();
                let context_snapshot = state.context.clone();
                let resolved = resolve_variables(&step.config, &context_snapshot);
                let entry = state
                    .step_states
                    .entry(step.id.clone())
                    .or_insert_with(|| StepState::new(step.id.clone()));
                entry.status = StepStatus::Running;
                entry.started_at = Some(Utc::now());
                entry.input = resolved.clone();
                state.current_step_id = Some(step.id.clone());
                resolved
            };

            debug!(step_id = %step.id, step_type = step.step_type.as_str(), "executing step");
            let outcome = self.dispatch_step(ctx, step, &resolved);

            match outcome {
                Ok(output) => {
                    // Publishing the terminal status and the context entry
                    // under one write makes the output visible exactly when
                    // predecessor waiters see completion
                    let mut state = ctx.state.write();
                    let entry = state
                        .step_states
                        .get_mut(&step.id)
                        .expect("step state initialized above");
                    entry.output = Some(output.clone());
                    entry.status = StepStatus::Completed;
                    entry.completed_at = Some(Utc::now());
                    state
                        .context
                        .insert(format!("step_{}", step.id), Value::Object(output));
                    self.metrics
                        .record_step(step.step_type.as_str(), "completed");
                    return Ok(());
                }
                Err(err) => {
                    let retry = {
                        let mut state = ctx.state.write();
                        let entry = state
                            .step_states
                            .get_mut(&step.id)
                            .expect("step state initialized above");
                        entry.status = StepStatus::Failed;
                        entry.error_message = Some(err.to_string());
                        entry.completed_at = Some(Utc::now());
                        if entry.retry_count < step.max_retries {
                            entry.retry_count += 1;
                            entry.status = StepStatus::Pending;
                            Some(entry.retry_count)
                        } else {
                            None
                        }
                    };

                    if let Some(attempt) = retry {
                        let delay = Duration::from_secs(2u64.pow(attempt.min(16)));
                        warn!(step_id = %step.id, attempt, delay_secs = delay.as_secs(), "retrying step");
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    error!(step_id = %step.id, error = %err, "step failed");
                    self.metrics.record_step(step.step_type.as_str(), "failed");
                    return Err(err);
                }
            }
        }
    }

    /// Dispatch by step type. Each type is a pure function from resolved
    /// config and current state to an output record.
    fn dispatch_step(
        &self,
        ctx: &ExecutionCtx,
        step: &StepDefinition,
        config: &Metadata,
    ) -> Result<Metadata> {
        match step.step_type {
            StepType::Navigate => {
                let url = config.get("url").cloned().unwrap_or_else(|| "".into());
                Ok(output(&[("url", url), ("success", Value::Bool(true))]))
            }
            StepType::Extract => {
                let selector = config.get("selector").cloned().unwrap_or_else(|| "".into());
                let extract_type = config
                    .get("extract_type")
                    .cloned()
                    .unwrap_or_else(|| "text".into());
                Ok(output(&[
                    ("selector", selector),
                    ("extract_type", extract_type),
                    ("data", Value::Array(Vec::new())),
                ]))
            }
            StepType::Action => {
                let action_type = config
                    .get("action_type")
                    .cloned()
                    .unwrap_or_else(|| "".into());
                Ok(output(&[
                    ("action_type", action_type),
                    ("success", Value::Bool(true)),
                ]))
            }
            StepType::Analyze => {
                let analysis_type = config
                    .get("analysis_type")
                    .cloned()
                    .unwrap_or_else(|| "".into());
                let data = config.get("data").cloned().unwrap_or(Value::Null);
                Ok(output(&[("analysis_type", analysis_type), ("result", data)]))
            }
            StepType::Condition => {
                let condition = config
                    .get("condition")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                let context_snapshot = ctx.state.read().context.clone();
                let result = expr::evaluate_condition(&condition, &context_snapshot)?;
                Ok(output(&[
                    ("condition", Value::String(condition)),
                    ("result", Value::Bool(result)),
                ]))
            }
            StepType::Loop => {
                let items = match config.get("items") {
                    Some(Value::Array(items)) => items.clone(),
                    _ => Vec::new(),
                };
                let base_context = ctx.state.read().context.clone();
                let mut results = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    // Loop bodies are not executed; the scoped context is
                    // assembled for parity with a future body_steps revision
                    let mut loop_context = base_context.clone();
                    loop_context.insert("item".to_string(), item.clone());
                    loop_context.insert("index".to_string(), Value::Number(index.into()));
                    results.push(item);
                }
                Ok(output(&[("results", Value::Array(results))]))
            }
            StepType::Custom => {
                let handler = config.get("handler").cloned().unwrap_or_else(|| "".into());
                Ok(output(&[("handler", handler), ("success", Value::Bool(true))]))
            }
        }
    }
}

fn output(entries: &[(&str, Value)]) -> Metadata {
    let mut map = Metadata::new();
    for (key, value) in entries {
        map.insert((*key).to_string(), value.clone());
    }
    map
}

/// Recursive shallow substitution: a string value whose first character is
/// `$` is replaced by the context entry it names, if present. Embedded
/// references (`"a$foo"`) are not interpolated.
pub fn resolve_variables(config: &Metadata, context: &Metadata) -> Metadata {
    let mut resolved = Metadata::new();
    for (key, value) in config {
        resolved.insert(key.clone(), resolve_value(value, context));
    }
    resolved
}

fn resolve_value(value: &Value, context: &Metadata) -> Value {
    match value {
        Value::String(s) => match s.strip_prefix('$') {
            Some(name) => context.get(name).cloned().unwrap_or_else(|| value.clone()),
            None => value.clone(),
        },
        Value::Object(map) => {
            let mut resolved = serde_json::Map::new();
            for (key, inner) in map {
                resolved.insert(key.clone(), resolve_value(inner, context));
            }
            Value::Object(resolved)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_value(item, context))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryExecutionStore;
    use crate::templates;
    use serde_json::json;
    use workstation_common::metrics::DefaultMetricsCollector;

    fn fast_config() -> WorkflowConfig {
        WorkflowConfig {
            step_wait_timeout_seconds: 300,
            step_poll_interval_ms: 10,
        }
    }

    fn engine() -> WorkflowEngine {
        WorkflowEngine::new(fast_config(), Arc::new(DefaultMetricsCollector))
    }

    fn ctx(entries: &[(&str, Value)]) -> Metadata {
        let mut map = Metadata::new();
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        map
    }

    mod variable_resolution {
        use super::*;

        #[test]
        fn dollar_reference_is_replaced() {
            let config = ctx(&[("value", json!("$foo"))]);
            let context = ctx(&[("foo", json!(42))]);
            let resolved = resolve_variables(&config, &context);
            assert_eq!(resolved.get("value").unwrap(), &json!(42));
        }

        #[test]
        fn missing_reference_is_left_as_is() {
            let config = ctx(&[("value", json!("$foo"))]);
            let resolved = resolve_variables(&config, &Metadata::new());
            assert_eq!(resolved.get("value").unwrap(), &json!("$foo"));
        }

        #[test]
        fn no_interpolation_inside_strings() {
            let config = ctx(&[("value", json!("a$foo"))]);
            let context = ctx(&[("foo", json!(42))]);
            let resolved = resolve_variables(&config, &context);
            assert_eq!(resolved.get("value").unwrap(), &json!("a$foo"));
        }

        #[test]
        fn nested_maps_and_lists_are_traversed() {
            let config = ctx(&[(
                "data",
                json!({"site1": "$a", "list": ["$b", {"deep": "$c"}, 7]}),
            )]);
            let context = ctx(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3))]);
            let resolved = resolve_variables(&config, &context);
            assert_eq!(
                resolved.get("data").unwrap(),
                &json!({"site1": 1, "list": [2, {"deep": 3}, 7]})
            );
        }

        #[test]
        fn non_string_scalars_pass_through() {
            let config = ctx(&[("n", json!(5)), ("b", json!(true)), ("x", json!(null))]);
            let resolved = resolve_variables(&config, &Metadata::new());
            assert_eq!(resolved.get("n").unwrap(), &json!(5));
            assert_eq!(resolved.get("b").unwrap(), &json!(true));
            assert_eq!(resolved.get("x").unwrap(), &json!(null));
        }
    }

    mod registration {
        use super::*;
        use workstation_core::workflow::{StepDefinition, StepType, WorkflowDefinition};

        #[test]
        fn duplicate_step_ids_rejected() {
            let definition = WorkflowDefinition::new("wf", "Workflow")
                .step(StepDefinition::new("a", StepType::Navigate))
                .step(StepDefinition::new("a", StepType::Extract));
            assert!(matches!(
                engine().register_workflow(definition),
                Err(Error::Validation(_))
            ));
        }

        #[test]
        fn dangling_successor_rejected() {
            let definition = WorkflowDefinition::new("wf", "Workflow")
                .step(StepDefinition::new("a", StepType::Navigate).then(&["ghost"]));
            assert!(matches!(
                engine().register_workflow(definition),
                Err(Error::Validation(_))
            ));
        }

        #[test]
        fn unknown_initial_step_rejected() {
            let definition = WorkflowDefinition::new("wf", "Workflow")
                .starting_at("ghost")
                .step(StepDefinition::new("a", StepType::Navigate));
            assert!(matches!(
                engine().register_workflow(definition),
                Err(Error::Validation(_))
            ));
        }

        #[test]
        fn next_steps_cycle_rejected() {
            let definition = WorkflowDefinition::new("wf", "Workflow")
                .step(StepDefinition::new("a", StepType::Navigate).then(&["b"]))
                .step(StepDefinition::new("b", StepType::Action).then(&["a"]));
            assert!(matches!(
                engine().register_workflow(definition),
                Err(Error::Validation(_))
            ));
        }

        #[test]
        fn empty_workflow_rejected() {
            let definition = WorkflowDefinition::new("wf", "Workflow");
            assert!(engine().register_workflow(definition).is_err());
        }

        #[test]
        fn on_error_back_reference_is_allowed() {
            // on_error/on_success edges do not create predecessor waits
            let definition = WorkflowDefinition::new("wf", "Workflow")
                .step(StepDefinition::new("a", StepType::Navigate).then(&["b"]))
                .step(
                    StepDefinition::new("b", StepType::Condition)
                        .with_config(json!({"condition": "true"}))
                        .on_error("a"),
                );
            assert!(engine().register_workflow(definition).is_ok());
        }
    }

    mod execution {
        use super::*;
        use workstation_core::workflow::{StepDefinition, StepType, WorkflowDefinition};

        #[tokio::test(start_paused = true)]
        async fn unknown_workflow_is_a_lookup_failure() {
            let engine = engine();
            let err = engine
                .execute_workflow("ghost", Metadata::new(), None)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::NotFound(_)));
        }

        #[tokio::test(start_paused = true)]
        async fn price_comparison_runs_in_order() {
            let engine = engine();
            engine
                .register_workflow(templates::price_comparison())
                .unwrap();

            let context = ctx(&[
                ("site1Url", json!("A")),
                ("site2Url", json!("B")),
                ("priceSelector", json!(".p")),
            ]);
            let state = engine
                .execute_workflow("price-comparison", context, None)
                .await
                .unwrap();

            assert_eq!(state.status, WorkflowStatus::Completed);
            assert_eq!(state.step_states.len(), 5);
            for step in state.step_states.values() {
                assert_eq!(step.status, StepStatus::Completed);
            }

            // Steps ran in definition order
            let at = |id: &str| state.step_states[id].started_at.unwrap();
            assert!(at("extract-1") >= state.step_states["navigate-1"].completed_at.unwrap());
            assert!(at("navigate-2") >= state.step_states["extract-1"].completed_at.unwrap());
            assert!(at("analyze") >= state.step_states["extract-2"].completed_at.unwrap());

            // Resolved urls flowed from the initial context
            assert_eq!(state.step_states["navigate-1"].input["url"], json!("A"));
            assert_eq!(state.step_states["navigate-2"].input["url"], json!("B"));

            // The analyze step saw extract-1's published output
            let analyze_input = &state.step_states["analyze"].input;
            assert_eq!(
                analyze_input["data"]["site1"],
                serde_json::to_value(state.step_states["extract-1"].output.clone().unwrap())
                    .unwrap()
            );

            // And the context carries every step output
            assert!(state.context.contains_key("step_navigate-1"));
            assert!(state.context.contains_key("step_analyze"));
        }

        #[tokio::test(start_paused = true)]
        async fn content_aggregation_feeds_extracted_links_to_the_loop() {
            let engine = engine();
            engine
                .register_workflow(templates::content_aggregation())
                .unwrap();

            let state = engine
                .execute_workflow("content-aggregation", Metadata::new(), None)
                .await
                .unwrap();

            assert_eq!(state.status, WorkflowStatus::Completed);
            assert_eq!(state.step_states.len(), 3);

            // The loop step resolved its items from extract-links' published
            // output, not from a literal `$`-string
            let extracted = serde_json::to_value(
                state.step_states["extract-links"].output.clone().unwrap(),
            )
            .unwrap();
            let loop_input = &state.step_states["loop-articles"].input;
            assert_eq!(loop_input["items"], extracted);

            // And the aggregate step saw the loop's published output
            let aggregate_input = &state.step_states["aggregate"].input;
            assert_eq!(
                aggregate_input["data"],
                serde_json::to_value(
                    state.step_states["loop-articles"].output.clone().unwrap()
                )
                .unwrap()
            );
        }

        #[tokio::test(start_paused = true)]
        async fn form_filling_converges_on_submit_once() {
            let engine = engine();
            engine.register_workflow(templates::form_filling()).unwrap();

            let context = ctx(&[
                ("formUrl", json!("https://forms.example")),
                ("name", json!("Ada")),
                ("email", json!("ada@example.com")),
            ]);
            let state = engine
                .execute_workflow("form-filling", context, None)
                .await
                .unwrap();

            assert_eq!(state.status, WorkflowStatus::Completed);
            // navigate, fill-name, fill-email, submit: each exactly once
            assert_eq!(state.step_states.len(), 4);

            let submit_started = state.step_states["submit"].started_at.unwrap();
            assert!(submit_started >= state.step_states["fill-name"].completed_at.unwrap());
            assert!(submit_started >= state.step_states["fill-email"].completed_at.unwrap());

            assert_eq!(
                state.step_states["fill-name"].input["value"],
                json!("Ada")
            );
        }

        #[tokio::test(start_paused = true)]
        async fn condition_step_evaluates_against_context() {
            let engine = engine();
            let definition = WorkflowDefinition::new("cond", "Condition check").step(
                StepDefinition::new("check", StepType::Condition)
                    .with_config(json!({"condition": "threshold < 10"})),
            );
            engine.register_workflow(definition).unwrap();

            let state = engine
                .execute_workflow("cond", ctx(&[("threshold", json!(5))]), None)
                .await
                .unwrap();
            let check = &state.step_states["check"];
            assert_eq!(check.output.as_ref().unwrap()["result"], json!(true));

            let state = engine
                .execute_workflow("cond", ctx(&[("threshold", json!(50))]), None)
                .await
                .unwrap();
            let check = &state.step_states["check"];
            assert_eq!(check.output.as_ref().unwrap()["result"], json!(false));
        }

        #[tokio::test(start_paused = true)]
        async fn failing_step_routes_to_on_error() {
            let engine = engine();
            let definition = WorkflowDefinition::new("fallback", "Error routing")
                .step(
                    StepDefinition::new("check", StepType::Condition)
                        // Arithmetic is outside the grammar, so this fails
                        .with_config(json!({"condition": "count + 1"}))
                        .on_error("recover"),
                )
                .step(
                    StepDefinition::new("recover", StepType::Custom)
                        .with_config(json!({"handler": "notify"})),
                );
            engine.register_workflow(definition).unwrap();

            let state = engine
                .execute_workflow("fallback", Metadata::new(), None)
                .await
                .unwrap();

            assert_eq!(state.status, WorkflowStatus::Completed);
            assert_eq!(state.step_states["check"].status, StepStatus::Failed);
            assert!(state.step_states["check"].error_message.is_some());
            assert_eq!(state.step_states["recover"].status, StepStatus::Completed);
        }

        #[tokio::test(start_paused = true)]
        async fn failing_step_without_on_error_fails_execution() {
            let engine = engine();
            let definition = WorkflowDefinition::new("doomed", "No fallback").step(
                StepDefinition::new("check", StepType::Condition)
                    .with_config(json!({"condition": "count + 1"})),
            );
            engine.register_workflow(definition).unwrap();

            let state = engine
                .execute_workflow("doomed", Metadata::new(), None)
                .await
                .unwrap();
            assert_eq!(state.status, WorkflowStatus::Failed);
            assert!(state.error_message.is_some());
            assert!(state.completed_at.is_some());
        }

        #[tokio::test(start_paused = true)]
        async fn step_retries_before_failing() {
            let engine = engine();
            let definition = WorkflowDefinition::new("retrying", "Retry budget").step(
                StepDefinition::new("check", StepType::Condition)
                    .with_config(json!({"condition": "count + 1"}))
                    .with_retries(2),
            );
            engine.register_workflow(definition).unwrap();

            let started = tokio::time::Instant::now();
            let state = engine
                .execute_workflow("retrying", Metadata::new(), None)
                .await
                .unwrap();

            assert_eq!(state.status, WorkflowStatus::Failed);
            assert_eq!(state.step_states["check"].retry_count, 2);
            // Backoff slept 2^1 + 2^2 seconds
            assert!(started.elapsed() >= Duration::from_secs(6));
        }

        #[tokio::test(start_paused = true)]
        async fn loop_step_collects_items() {
            let engine = engine();
            let definition = WorkflowDefinition::new("looped", "Loop collection").step(
                StepDefinition::new("each", StepType::Loop)
                    .with_config(json!({"items": "$articles"})),
            );
            engine.register_workflow(definition).unwrap();

            let state = engine
                .execute_workflow(
                    "looped",
                    ctx(&[("articles", json!(["one", "two", "three"]))]),
                    None,
                )
                .await
                .unwrap();

            let each = &state.step_states["each"];
            assert_eq!(
                each.output.as_ref().unwrap()["results"],
                json!(["one", "two", "three"])
            );
        }

        #[tokio::test(start_paused = true)]
        async fn execution_is_persisted_through_the_store() {
            let store = Arc::new(InMemoryExecutionStore::new());
            let engine = WorkflowEngine::new(fast_config(), Arc::new(DefaultMetricsCollector))
                .with_store(Arc::clone(&store) as Arc<dyn ExecutionStore>);
            engine.register_workflow(templates::form_filling()).unwrap();

            let context = ctx(&[
                ("formUrl", json!("https://forms.example")),
                ("name", json!("Ada")),
                ("email", json!("ada@example.com")),
            ]);
            let state = engine
                .execute_workflow("form-filling", context, Some(42))
                .await
                .unwrap();

            let record = store.get(&state.execution_id).unwrap();
            assert_eq!(record.status, WorkflowStatus::Completed);
            assert_eq!(record.user_id, Some(42));
            assert!(record.result.is_some());
            assert!(record.completed_at.is_some());
        }

        #[tokio::test(start_paused = true)]
        async fn execution_state_is_queryable_afterwards() {
            let engine = engine();
            engine.register_workflow(templates::form_filling()).unwrap();

            let state = engine
                .execute_workflow(
                    "form-filling",
                    ctx(&[("formUrl", json!("u")), ("name", json!("n")), ("email", json!("e"))]),
                    None,
                )
                .await
                .unwrap();

            let fetched = engine.execution_state(&state.execution_id).unwrap();
            assert_eq!(fetched.status, WorkflowStatus::Completed);
            assert!(engine.execution_state("missing").is_none());
        }
    }
}
