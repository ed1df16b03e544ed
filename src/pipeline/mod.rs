// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! Pipeline definitions, graph, and execution
//!
//! This module defines tasks and pipelines, the dependency graph between
//! tasks, per-run state, and the executor that drives a run.

mod dag;
mod definition;
mod executor;
mod run;
mod validation;

pub use dag::DagBuilder;
pub use definition::*;
pub use executor::{ExecutionOptions, PipelineExecutor};
pub use run::{Run, RunOutcome, RunResult, TaskFailure, TaskRecord, TaskStatus};
pub use validation::{PipelineValidator, ValidationResult};
