// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! Run state
//!
//! A [`Run`] is one invocation of a pipeline. It owns the per-task status
//! map and is the only thing mutated while a pipeline executes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};

use crate::errors::DagflowError;
use crate::pipeline::Pipeline;

/// Execution status of a task within a run
///
/// Valid transitions:
/// - `Pending` -> `Running`
/// - `Pending` -> `Skipped`
/// - `Running` -> `Succeeded`
/// - `Running` -> `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl TaskStatus {
    /// Whether the status can no longer change in this run
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Skipped)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// Every task succeeded
    Success,
    /// A task failed and its failure was not tolerated
    Failure,
    /// Only `allow_failure` tasks failed
    Partial,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Partial => write!(f, "partial"),
        }
    }
}

/// The failing task of a run and why it failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task: String,
    pub cause: String,
}

impl TaskFailure {
    /// Convert into the crate error type
    pub fn into_error(self) -> DagflowError {
        DagflowError::TaskExecutionFailure {
            task: self.task,
            cause: self.cause,
        }
    }
}

/// Final state of one task after a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: String,
    pub status: TaskStatus,
    /// Failure message, when the task failed
    pub error: Option<String>,
    #[serde(skip)]
    pub duration: Duration,
}

/// Mutable state of a pipeline run
#[derive(Debug)]
pub struct Run {
    names: Vec<String>,
    statuses: Vec<TaskStatus>,
    errors: Vec<Option<String>>,
    durations: Vec<Duration>,
    execution_order: Vec<String>,
    failures: Vec<(usize, bool)>,
    started_at: SystemTime,
}

impl Run {
    /// Start a run with every task pending
    pub fn new(pipeline: &Pipeline) -> Self {
        let n = pipeline.len();
        Self {
            names: pipeline.tasks().iter().map(|t| t.name.clone()).collect(),
            statuses: vec![TaskStatus::Pending; n],
            errors: vec![None; n],
            durations: vec![Duration::ZERO; n],
            execution_order: Vec::with_capacity(n),
            failures: Vec::new(),
            started_at: SystemTime::now(),
        }
    }

    /// Status of a task by declaration index
    pub fn status(&self, idx: usize) -> TaskStatus {
        self.statuses[idx]
    }

    /// Status of a task by name
    pub fn status_of(&self, name: &str) -> Option<TaskStatus> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.statuses[idx])
    }

    /// Move a task to a new status, enforcing the state machine
    pub fn transition(&mut self, idx: usize, to: TaskStatus) -> Result<(), DagflowError> {
        let from = self.statuses[idx];
        if !from.can_transition_to(to) {
            return Err(DagflowError::InvalidTransition {
                task: self.names[idx].clone(),
                from,
                to,
            });
        }

        self.statuses[idx] = to;
        if to == TaskStatus::Running {
            self.execution_order.push(self.names[idx].clone());
        }
        Ok(())
    }

    /// Mark a running task as succeeded
    pub fn succeed(&mut self, idx: usize, duration: Duration) -> Result<(), DagflowError> {
        self.transition(idx, TaskStatus::Succeeded)?;
        self.durations[idx] = duration;
        Ok(())
    }

    /// Mark a running task as failed
    pub fn fail(
        &mut self,
        idx: usize,
        cause: String,
        tolerated: bool,
        duration: Duration,
    ) -> Result<(), DagflowError> {
        self.transition(idx, TaskStatus::Failed)?;
        self.errors[idx] = Some(cause);
        self.durations[idx] = duration;
        self.failures.push((idx, tolerated));
        Ok(())
    }

    /// Mark a pending task as skipped; already-terminal tasks are left alone
    pub fn skip(&mut self, idx: usize) -> Result<(), DagflowError> {
        if self.statuses[idx] == TaskStatus::Pending {
            self.transition(idx, TaskStatus::Skipped)?;
        }
        Ok(())
    }

    /// Whether a non-tolerated failure has been recorded
    pub fn has_hard_failure(&self) -> bool {
        self.failures.iter().any(|(_, tolerated)| !tolerated)
    }

    /// Finish the run and compute its outcome
    ///
    /// `plan` is the topological order the run was scheduled from.
    pub fn finish(
        self,
        pipeline_name: &str,
        plan: Vec<String>,
        duration: Duration,
        dry_run: bool,
    ) -> RunResult {
        let hard_failure = self
            .failures
            .iter()
            .find(|(_, tolerated)| !tolerated)
            .map(|(idx, _)| *idx);

        let outcome = if hard_failure.is_some() {
            RunOutcome::Failure
        } else if !self.failures.is_empty() {
            RunOutcome::Partial
        } else {
            RunOutcome::Success
        };

        let failure = hard_failure.map(|idx| TaskFailure {
            task: self.names[idx].clone(),
            cause: self.errors[idx].clone().unwrap_or_default(),
        });

        let tasks = self
            .names
            .into_iter()
            .zip(self.statuses)
            .zip(self.errors)
            .zip(self.durations)
            .map(|(((name, status), error), duration)| TaskRecord {
                name,
                status,
                error,
                duration,
            })
            .collect();

        RunResult {
            pipeline: pipeline_name.to_string(),
            outcome,
            failure,
            tasks,
            plan,
            execution_order: self.execution_order,
            started_at: self.started_at,
            duration,
            dry_run,
        }
    }
}

/// Result of executing a pipeline
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Pipeline name
    pub pipeline: String,
    /// Overall outcome
    pub outcome: RunOutcome,
    /// First task whose failure was not tolerated
    pub failure: Option<TaskFailure>,
    /// Final state of every task, in declaration order
    pub tasks: Vec<TaskRecord>,
    /// Topological order computed before any task started
    pub plan: Vec<String>,
    /// Task names in the order they started
    pub execution_order: Vec<String>,
    pub started_at: SystemTime,
    /// Total execution time
    pub duration: Duration,
    /// No operation was invoked
    pub dry_run: bool,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    /// Final status of a task
    pub fn status(&self, name: &str) -> Option<TaskStatus> {
        self.tasks.iter().find(|t| t.name == name).map(|t| t.status)
    }

    /// Names of tasks that ended with `status`, in declaration order
    pub fn tasks_with_status(&self, status: TaskStatus) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.status == status)
            .map(|t| t.name.as_str())
            .collect()
    }

    /// `(name, status)` pairs in declaration order
    pub fn statuses(&self) -> Vec<(&str, TaskStatus)> {
        self.tasks.iter().map(|t| (t.name.as_str(), t.status)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Parameters;

    fn two_task_pipeline() -> Pipeline {
        let mut pipeline = Pipeline::new("p");
        pipeline.define_task("a", "noop", Parameters::new()).unwrap();
        pipeline.define_task("b", "noop", Parameters::new()).unwrap();
        pipeline
    }

    #[test]
    fn test_valid_transitions() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Skipped));
        assert!(Running.can_transition_to(Succeeded));
        assert!(Running.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Succeeded));
        assert!(!Succeeded.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Skipped.can_transition_to(Running));
        assert!(!Running.can_transition_to(Skipped));
    }

    #[test]
    fn test_no_reentry_into_running() {
        let mut run = Run::new(&two_task_pipeline());
        run.transition(0, TaskStatus::Running).unwrap();
        run.succeed(0, Duration::ZERO).unwrap();

        let err = run.transition(0, TaskStatus::Running).unwrap_err();
        assert_eq!(
            err,
            DagflowError::InvalidTransition {
                task: "a".into(),
                from: TaskStatus::Succeeded,
                to: TaskStatus::Running,
            }
        );
    }

    #[test]
    fn test_skip_leaves_terminal_tasks_alone() {
        let mut run = Run::new(&two_task_pipeline());
        run.transition(0, TaskStatus::Running).unwrap();
        run.succeed(0, Duration::ZERO).unwrap();

        run.skip(0).unwrap();
        run.skip(1).unwrap();
        assert_eq!(run.status(0), TaskStatus::Succeeded);
        assert_eq!(run.status_of("b"), Some(TaskStatus::Skipped));
    }

    fn plan() -> Vec<String> {
        vec!["a".into(), "b".into()]
    }

    #[test]
    fn test_hard_failure_ignores_tolerated_failures() {
        let mut run = Run::new(&two_task_pipeline());
        run.transition(0, TaskStatus::Running).unwrap();
        run.fail(0, "flaky".into(), true, Duration::ZERO).unwrap();
        assert!(!run.has_hard_failure());

        run.transition(1, TaskStatus::Running).unwrap();
        run.fail(1, "boom".into(), false, Duration::ZERO).unwrap();
        assert!(run.has_hard_failure());
    }

    #[test]
    fn test_outcomes() {
        let pipeline = two_task_pipeline();

        let mut run = Run::new(&pipeline);
        for idx in 0..2 {
            run.transition(idx, TaskStatus::Running).unwrap();
            run.succeed(idx, Duration::ZERO).unwrap();
        }
        let result = run.finish("p", plan(), Duration::ZERO, false);
        assert_eq!(result.outcome, RunOutcome::Success);
        assert_eq!(result.plan, plan());
        assert_eq!(result.execution_order, vec!["a", "b"]);

        let mut run = Run::new(&pipeline);
        run.transition(0, TaskStatus::Running).unwrap();
        run.fail(0, "flaky".into(), true, Duration::ZERO).unwrap();
        run.transition(1, TaskStatus::Running).unwrap();
        run.succeed(1, Duration::ZERO).unwrap();
        let result = run.finish("p", plan(), Duration::ZERO, false);
        assert_eq!(result.outcome, RunOutcome::Partial);
        assert!(result.failure.is_none());

        let mut run = Run::new(&pipeline);
        run.transition(0, TaskStatus::Running).unwrap();
        run.fail(0, "boom".into(), false, Duration::ZERO).unwrap();
        run.skip(1).unwrap();
        let result = run.finish("p", plan(), Duration::ZERO, false);
        assert_eq!(result.outcome, RunOutcome::Failure);
        assert_eq!(
            result.failure,
            Some(TaskFailure {
                task: "a".into(),
                cause: "boom".into()
            })
        );
        assert_eq!(result.tasks_with_status(TaskStatus::Skipped), vec!["b"]);
    }
}
