// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! # dagflow - Workflow DAG Runner
//!
//! `dagflow` runs a pipeline of named tasks in dependency order. Each task
//! delegates its work to an [`Operation`](operations::Operation) that
//! receives the task's parameter bag and reports success or failure.
//!
//! ## Features
//!
//! - **Explicit definition** - tasks and edges are declared on a pipeline value
//! - **Checked graph** - duplicate names, unknown tasks and cycles are rejected up front
//! - **Ordered execution** - Kahn's algorithm, ties broken by declaration order
//! - **Contained failures** - a failed task skips its downstream tasks only
//!
//! ## Example
//!
//! ```no_run
//! use dagflow::operations::{from_fn, OperationError};
//! use dagflow::{ExecutionOptions, Parameters, Pipeline, PipelineExecutor};
//!
//! # async fn demo() -> dagflow::DagflowResult<()> {
//! let mut pipeline = Pipeline::new("stackoverflow");
//! pipeline.define_task("extract_posts", "copy", Parameters::new())?;
//! pipeline.define_task("load_posts", "copy", Parameters::new())?;
//! pipeline.declare_dependency("extract_posts", "load_posts")?;
//!
//! let executor = PipelineExecutor::new()
//!     .with_operation("copy", from_fn(|_| Ok::<(), OperationError>(())));
//! let result = executor.run(&pipeline, &ExecutionOptions::default()).await?;
//! assert!(result.is_success());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod errors;
pub mod operations;
pub mod pipeline;
pub mod utils;

// Re-export commonly used types
pub use errors::{DagflowError, DagflowResult};
pub use pipeline::{
    ExecutionOptions, Parameters, Pipeline, PipelineExecutor, RunOutcome, RunResult, Task,
    TaskStatus,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
