// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! Pipeline executor
//!
//! Runs pipeline tasks in dependency order. Tasks become ready when all of
//! their upstreams have succeeded (or failed with `allow_failure`); among
//! ready tasks the one declared first starts first. With the default
//! `max_parallel = 1` this is a plain sequential walk of the topological
//! order.
//!
//! Only the coordinating loop writes to the [`Run`]; spawned operations
//! report back through a `JoinSet` and are recorded one completion at a time.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::Instrument;

use crate::errors::{DagflowError, DagflowResult};
use crate::operations::{Operation, OperationError};
use crate::pipeline::{DagBuilder, Pipeline, Run, RunResult, TaskStatus};

/// Pipeline execution options
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Only compute the plan; invoke nothing
    pub dry_run: bool,
    /// Stop starting new tasks after the first failure
    pub fail_fast: bool,
    /// Maximum number of tasks in flight
    pub max_parallel: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            fail_fast: false,
            max_parallel: 1,
        }
    }
}

type Completion = (usize, Result<(), OperationError>, Duration);

/// Pipeline executor
pub struct PipelineExecutor {
    /// Registered operations by kind
    operations: HashMap<String, Arc<dyn Operation>>,
}

impl PipelineExecutor {
    /// Create an executor with no operations registered
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    /// Create an executor with the built-in operations
    pub fn with_default_operations() -> Self {
        Self {
            operations: crate::operations::create_default_operations(),
        }
    }

    /// Register an operation under a kind name
    pub fn register_operation(&mut self, name: &str, operation: Arc<dyn Operation>) {
        self.operations.insert(name.to_string(), operation);
    }

    /// Builder-style [`register_operation`](Self::register_operation)
    pub fn with_operation(mut self, name: &str, operation: impl Operation + 'static) -> Self {
        self.register_operation(name, Arc::new(operation));
        self
    }

    /// Registered operation kinds, sorted
    pub fn operation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Get a registered operation
    pub fn operation(&self, name: &str) -> Option<&Arc<dyn Operation>> {
        self.operations.get(name)
    }

    /// Resolve every task's operation before anything runs
    fn resolve_operations(&self, pipeline: &Pipeline) -> DagflowResult<Vec<Arc<dyn Operation>>> {
        pipeline
            .tasks()
            .iter()
            .map(|task| {
                self.operations
                    .get(&task.operation)
                    .cloned()
                    .ok_or_else(|| DagflowError::OperationNotFound {
                        operation: task.operation.clone(),
                        task: task.name.clone(),
                    })
            })
            .collect()
    }

    /// Execute a pipeline
    ///
    /// Returns `Err` only for problems found before any task starts. Task
    /// failures are reported through the returned [`RunResult`].
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        options: &ExecutionOptions,
    ) -> DagflowResult<RunResult> {
        let start = Instant::now();
        let span = tracing::info_span!("run", pipeline = %pipeline.name());

        let dag = DagBuilder::build(pipeline);
        let plan = dag.topological_order_names()?;
        let operations = self.resolve_operations(pipeline)?;
        let mut run = Run::new(pipeline);

        if options.dry_run {
            span.in_scope(|| tracing::info!(plan = ?plan, "dry run"));
            return Ok(run.finish(pipeline.name(), plan, start.elapsed(), true));
        }

        self.schedule(pipeline, &dag, &operations, &mut run, options)
            .instrument(span.clone())
            .await?;

        let result = run.finish(pipeline.name(), plan, start.elapsed(), false);
        span.in_scope(|| {
            tracing::info!(
                outcome = %result.outcome,
                duration_ms = result.duration.as_millis() as u64,
                "run finished"
            )
        });
        Ok(result)
    }

    /// Kahn's algorithm driven by task completions
    async fn schedule(
        &self,
        pipeline: &Pipeline,
        dag: &DagBuilder,
        operations: &[Arc<dyn Operation>],
        run: &mut Run,
        options: &ExecutionOptions,
    ) -> DagflowResult<()> {
        let max_parallel = options.max_parallel.max(1);
        let mut remaining = dag.in_degrees();
        let mut ready: BinaryHeap<Reverse<usize>> = remaining
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();
        let mut in_flight: JoinSet<Completion> = JoinSet::new();

        loop {
            let halted = options.fail_fast && run.has_hard_failure();
            while !halted && in_flight.len() < max_parallel {
                let Some(Reverse(idx)) = ready.pop() else {
                    break;
                };
                // Dependents of a failed task never become ready, but a
                // task may still be reached after a fail-fast halt
                if run.status(idx) != TaskStatus::Pending {
                    continue;
                }

                let task = &pipeline.tasks()[idx];
                run.transition(idx, TaskStatus::Running)?;
                tracing::info!(task = %task.name, operation = %task.operation, "task started");

                let operation = Arc::clone(&operations[idx]);
                let parameters = task.parameters.clone();
                let task_span = tracing::info_span!("task", task = %task.name);
                in_flight.spawn(
                    async move {
                        let started = Instant::now();
                        let call = async move { operation.execute(&parameters).await }
                            .instrument(tracing::Span::current());
                        // A panicking operation counts as a failed task
                        let result = match tokio::spawn(call).await {
                            Ok(result) => result,
                            Err(e) => {
                                Err(OperationError::new(format!("operation panicked: {}", e)))
                            }
                        };
                        (idx, result, started.elapsed())
                    }
                    .instrument(task_span),
                );
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let (idx, result, elapsed) = joined.map_err(|e| DagflowError::TaskExecutionFailure {
                task: "<executor>".to_string(),
                cause: e.to_string(),
            })?;
            let task = &pipeline.tasks()[idx];

            match result {
                Ok(()) => {
                    run.succeed(idx, elapsed)?;
                    tracing::info!(
                        task = %task.name,
                        duration_ms = elapsed.as_millis() as u64,
                        "task succeeded"
                    );
                    Self::release_dependents(dag, idx, &mut remaining, &mut ready);
                }
                Err(e) if task.allow_failure => {
                    tracing::warn!(task = %task.name, error = %e, "task failed (allowed)");
                    run.fail(idx, e.message, true, elapsed)?;
                    Self::release_dependents(dag, idx, &mut remaining, &mut ready);
                }
                Err(e) => {
                    tracing::error!(task = %task.name, error = %e, "task failed");
                    run.fail(idx, e.message, false, elapsed)?;

                    for downstream in dag.downstream_of(idx) {
                        run.skip(downstream)?;
                    }
                }
            }
        }

        // Everything still pending was cut off by a failure
        for idx in 0..pipeline.len() {
            if run.status(idx) == TaskStatus::Pending {
                tracing::debug!(task = %pipeline.tasks()[idx].name, "task skipped");
                run.skip(idx)?;
            }
        }

        Ok(())
    }

    fn release_dependents(
        dag: &DagBuilder,
        idx: usize,
        remaining: &mut [usize],
        ready: &mut BinaryHeap<Reverse<usize>>,
    ) {
        for next in dag.dependents_of(idx) {
            remaining[next] -= 1;
            if remaining[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    /// Tasks whose operation cannot run here, as `operation (task 'name')`
    ///
    /// Each task is checked with its own parameters, so a task that names a
    /// missing interpreter is reported even if the default one is installed.
    pub async fn check_operations(&self, pipeline: &Pipeline) -> Vec<String> {
        let mut missing = Vec::new();
        for task in pipeline.tasks() {
            match self.operations.get(&task.operation) {
                Some(operation) if operation.check_available(&task.parameters).await => {}
                _ => missing.push(format!("{} (task '{}')", task.operation, task.name)),
            }
        }
        missing
    }
}

impl Default for PipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::from_fn;
    use crate::pipeline::{Parameters, RunOutcome, Task, TaskFailure};
    use serde_json::json;
    use std::sync::Mutex;

    /// Operation that records the task name it ran for and fails on demand
    fn recorder(log: Arc<Mutex<Vec<String>>>) -> impl Operation + 'static {
        from_fn(move |params: &Parameters| {
            let name = params["task"].as_str().unwrap_or_default().to_string();
            log.lock().unwrap().push(name.clone());
            if params.get("fail").and_then(|v| v.as_bool()).unwrap_or(false) {
                Err(OperationError::new(format!("{} exploded", name)))
            } else {
                Ok(())
            }
        })
    }

    fn task_params(name: &str, fail: bool) -> Parameters {
        let mut params = Parameters::new();
        params.insert("task".into(), json!(name));
        params.insert("fail".into(), json!(fail));
        params
    }

    fn linear(failing: Option<&str>) -> Pipeline {
        let mut pipeline = Pipeline::new("linear");
        for name in ["a", "b", "c", "d", "e"] {
            pipeline
                .define_task(name, "record", task_params(name, failing == Some(name)))
                .unwrap();
        }
        pipeline.chain(&["a", "b", "c", "d", "e"]).unwrap();
        pipeline
    }

    fn executor() -> (PipelineExecutor, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let executor = PipelineExecutor::new().with_operation("record", recorder(log.clone()));
        (executor, log)
    }

    #[tokio::test]
    async fn test_linear_chain_success() {
        let (executor, log) = executor();
        let pipeline = linear(None);

        let result = executor.run(&pipeline, &ExecutionOptions::default()).await.unwrap();

        assert_eq!(result.outcome, RunOutcome::Success);
        assert!(result.failure.is_none());
        assert_eq!(result.tasks_with_status(TaskStatus::Succeeded).len(), 5);
        assert_eq!(result.execution_order, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_linear_chain_failure_skips_downstream() {
        let (executor, log) = executor();
        let pipeline = linear(Some("c"));

        let result = executor.run(&pipeline, &ExecutionOptions::default()).await.unwrap();

        assert_eq!(result.outcome, RunOutcome::Failure);
        assert_eq!(
            result.failure,
            Some(TaskFailure {
                task: "c".into(),
                cause: "c exploded".into()
            })
        );
        assert_eq!(
            result.statuses(),
            vec![
                ("a", TaskStatus::Succeeded),
                ("b", TaskStatus::Succeeded),
                ("c", TaskStatus::Failed),
                ("d", TaskStatus::Skipped),
                ("e", TaskStatus::Skipped),
            ]
        );
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_rejected_cycle_leaves_pipeline_runnable() {
        let (executor, _) = executor();
        let mut pipeline = linear(None);

        assert!(matches!(
            pipeline.declare_dependency("e", "a"),
            Err(DagflowError::Cycle { .. })
        ));

        let result = executor.run(&pipeline, &ExecutionOptions::default()).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.execution_order, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_failure_only_affects_downstream_closure() {
        let (executor, log) = executor();
        let mut pipeline = Pipeline::new("branches");
        pipeline
            .define_task("extract_posts", "record", task_params("extract_posts", true))
            .unwrap();
        pipeline.define_task("load_posts", "record", task_params("load_posts", false)).unwrap();
        pipeline
            .define_task("extract_users", "record", task_params("extract_users", false))
            .unwrap();
        pipeline.define_task("load_users", "record", task_params("load_users", false)).unwrap();
        pipeline.define_task("join", "record", task_params("join", false)).unwrap();
        pipeline.declare_dependency("extract_posts", "load_posts").unwrap();
        pipeline.declare_dependency("extract_users", "load_users").unwrap();
        pipeline.declare_dependency("load_posts", "join").unwrap();
        pipeline.declare_dependency("load_users", "join").unwrap();

        let result = executor.run(&pipeline, &ExecutionOptions::default()).await.unwrap();

        assert_eq!(result.outcome, RunOutcome::Failure);
        assert_eq!(result.status("extract_posts"), Some(TaskStatus::Failed));
        assert_eq!(result.status("load_posts"), Some(TaskStatus::Skipped));
        assert_eq!(result.status("join"), Some(TaskStatus::Skipped));
        assert_eq!(result.status("extract_users"), Some(TaskStatus::Succeeded));
        assert_eq!(result.status("load_users"), Some(TaskStatus::Succeeded));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["extract_posts", "extract_users", "load_users"]
        );
    }

    #[tokio::test]
    async fn test_fail_fast_halts_independent_branches() {
        let (executor, log) = executor();
        let mut pipeline = Pipeline::new("halt");
        pipeline.define_task("a", "record", task_params("a", true)).unwrap();
        pipeline.define_task("b", "record", task_params("b", false)).unwrap();

        let options = ExecutionOptions {
            fail_fast: true,
            ..ExecutionOptions::default()
        };
        let result = executor.run(&pipeline, &options).await.unwrap();

        assert_eq!(result.outcome, RunOutcome::Failure);
        assert_eq!(result.status("b"), Some(TaskStatus::Skipped));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_allow_failure_gives_partial() {
        let (executor, log) = executor();
        let mut pipeline = Pipeline::new("tolerant");
        pipeline
            .add_task(
                Task::new("flaky", "record", task_params("flaky", true)).with_allow_failure(true),
            )
            .unwrap();
        pipeline.define_task("after", "record", task_params("after", false)).unwrap();
        pipeline.declare_dependency("flaky", "after").unwrap();

        let result = executor.run(&pipeline, &ExecutionOptions::default()).await.unwrap();

        assert_eq!(result.outcome, RunOutcome::Partial);
        assert!(result.failure.is_none());
        assert_eq!(result.status("flaky"), Some(TaskStatus::Failed));
        assert_eq!(result.status("after"), Some(TaskStatus::Succeeded));
        assert_eq!(*log.lock().unwrap(), vec!["flaky", "after"]);
    }

    #[tokio::test]
    async fn test_rerun_of_pure_pipeline_is_stable() {
        let (executor, _) = executor();
        let pipeline = linear(Some("d"));

        let first = executor.run(&pipeline, &ExecutionOptions::default()).await.unwrap();
        let second = executor.run(&pipeline, &ExecutionOptions::default()).await.unwrap();

        assert_eq!(first.statuses(), second.statuses());
        assert_eq!(first.outcome, second.outcome);
    }

    #[tokio::test]
    async fn test_dry_run_invokes_nothing() {
        let (executor, log) = executor();
        let pipeline = linear(None);

        let options = ExecutionOptions {
            dry_run: true,
            ..ExecutionOptions::default()
        };
        let result = executor.run(&pipeline, &options).await.unwrap();

        assert!(result.dry_run);
        assert_eq!(result.outcome, RunOutcome::Success);
        assert_eq!(result.plan, vec!["a", "b", "c", "d", "e"]);
        assert!(result.execution_order.is_empty());
        assert_eq!(result.tasks_with_status(TaskStatus::Pending).len(), 5);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_plan_breaks_ties_by_declaration_order() {
        let (executor, _) = executor();
        let mut pipeline = Pipeline::new("fan-in");
        for name in ["extract_users", "extract_posts", "join"] {
            pipeline.define_task(name, "record", task_params(name, false)).unwrap();
        }
        pipeline.declare_dependency("extract_posts", "join").unwrap();
        pipeline.declare_dependency("extract_users", "join").unwrap();

        let result = executor.run(&pipeline, &ExecutionOptions::default()).await.unwrap();
        assert_eq!(result.plan, vec!["extract_users", "extract_posts", "join"]);
        assert_eq!(result.execution_order, result.plan);
    }

    #[tokio::test]
    async fn test_check_operations_uses_task_parameters() {
        let executor = PipelineExecutor::with_default_operations();
        let mut pipeline = Pipeline::new("shells");

        let mut params = Parameters::new();
        params.insert("command".into(), json!("true"));
        pipeline.define_task("default_shell", "shell", params.clone()).unwrap();

        params.insert("shell".into(), json!("definitely-not-a-shell-xyz"));
        pipeline.define_task("missing_shell", "shell", params).unwrap();
        pipeline.define_task("load", "bigquery", Parameters::new()).unwrap();

        let missing = executor.check_operations(&pipeline).await;
        assert_eq!(
            missing,
            vec![
                "shell (task 'missing_shell')".to_string(),
                "bigquery (task 'load')".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_unregistered_operation_fails_before_running() {
        let (executor, log) = executor();
        let mut pipeline = linear(None);
        pipeline.define_task("load", "bigquery", Parameters::new()).unwrap();

        let err = executor.run(&pipeline, &ExecutionOptions::default()).await.unwrap_err();
        assert_eq!(
            err,
            DagflowError::OperationNotFound {
                operation: "bigquery".into(),
                task: "load".into()
            }
        );
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_pipeline_succeeds() {
        let (executor, _) = executor();
        let result = executor
            .run(&Pipeline::new("empty"), &ExecutionOptions::default())
            .await
            .unwrap();
        assert!(result.is_success());
        assert!(result.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_operation_is_a_task_failure() {
        let executor = PipelineExecutor::new().with_operation(
            "explode",
            from_fn(|_: &Parameters| -> Result<(), OperationError> { panic!("connector bug") }),
        );
        let mut pipeline = Pipeline::new("panics");
        pipeline.define_task("a", "explode", Parameters::new()).unwrap();

        let result = executor.run(&pipeline, &ExecutionOptions::default()).await.unwrap();
        assert_eq!(result.outcome, RunOutcome::Failure);
        let failure = result.failure.unwrap();
        assert_eq!(failure.task, "a");
        assert!(failure.cause.contains("panicked"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallel_branches_overlap() {
        use async_trait::async_trait;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Gauge {
            current: AtomicUsize,
            peak: AtomicUsize,
        }

        #[async_trait]
        impl Operation for Gauge {
            async fn execute(&self, _parameters: &Parameters) -> Result<(), OperationError> {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.current.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let gauge = Arc::new(Gauge {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let mut executor = PipelineExecutor::new();
        executor.register_operation("gauge", gauge.clone());

        let mut pipeline = Pipeline::new("fan-in");
        for name in ["extract_posts", "extract_users", "join"] {
            pipeline.define_task(name, "gauge", Parameters::new()).unwrap();
        }
        pipeline.declare_dependency("extract_posts", "join").unwrap();
        pipeline.declare_dependency("extract_users", "join").unwrap();

        let options = ExecutionOptions {
            max_parallel: 4,
            ..ExecutionOptions::default()
        };
        let result = executor.run(&pipeline, &options).await.unwrap();

        assert!(result.is_success());
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 2);
        assert_eq!(result.execution_order.last().map(String::as_str), Some("join"));
    }
}
