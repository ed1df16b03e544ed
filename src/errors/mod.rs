// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! Error types
//!
//! Definition errors (duplicate, unknown, cycle) are raised while a pipeline
//! is being built and abort construction. Task failures at run time are
//! recorded in the run result instead of being returned as errors.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::TaskStatus;

/// Result type for dagflow operations
pub type DagflowResult<T> = Result<T, DagflowError>;

/// Main error type for dagflow
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum DagflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Definition Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Task '{task}' is already defined")]
    #[diagnostic(
        code(dagflow::duplicate_task),
        help("Task names must be unique within a pipeline")
    )]
    DuplicateTask { task: String },

    #[error("Unknown task '{task}'")]
    #[diagnostic(
        code(dagflow::unknown_task),
        help("Check that '{task}' is defined before declaring dependencies on it")
    )]
    UnknownTask { task: String },

    #[error("Dependency would create a cycle: {}", path.join(" -> "))]
    #[diagnostic(
        code(dagflow::cycle),
        help("Review your task dependencies to remove the cycle")
    )]
    Cycle { path: Vec<String> },

    #[error("Invalid task name '{task}'")]
    #[diagnostic(
        code(dagflow::invalid_task_name),
        help("Use letters, digits, '_', '-' or '.', starting with a letter or digit")
    )]
    InvalidTaskName { task: String },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(dagflow::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Task '{task}' failed: {cause}")]
    #[diagnostic(code(dagflow::task_execution_failure))]
    TaskExecutionFailure { task: String, cause: String },

    #[error("No operation registered for '{operation}' (used by task '{task}')")]
    #[diagnostic(
        code(dagflow::operation_not_found),
        help("Built-in operations: shell, noop")
    )]
    OperationNotFound { operation: String, task: String },

    #[error("Task '{task}' cannot move from {from} to {to}")]
    #[diagnostic(code(dagflow::invalid_transition))]
    InvalidTransition {
        task: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(dagflow::pipeline_not_found),
        help("Create a pipeline with 'dagflow init' or write .dagflow.yaml manually")
    )]
    PipelineNotFound { path: PathBuf },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(dagflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(dagflow::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(dagflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(dagflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON error: {message}")]
    #[diagnostic(code(dagflow::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(dagflow::toml_error))]
    Toml { message: String },
}

impl From<std::io::Error> for DagflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for DagflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for DagflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for DagflowError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl DagflowError {
    /// Whether this error is raised while defining a pipeline
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateTask { .. }
                | Self::UnknownTask { .. }
                | Self::Cycle { .. }
                | Self::InvalidTaskName { .. }
                | Self::InvalidPipeline { .. }
        )
    }
}
