// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! Pipeline validation
//!
//! Structural invariants are enforced while the pipeline is built; this
//! checks what can only be judged against the registered operations.

use crate::pipeline::{DagBuilder, Pipeline, PipelineExecutor};

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline against the operations an executor provides
    pub fn validate(pipeline: &Pipeline, executor: &PipelineExecutor) -> ValidationResult {
        let mut result = ValidationResult::new();

        if pipeline.is_empty() {
            result.add_warning("Pipeline has no tasks defined");
        }

        for task in pipeline.tasks() {
            match executor.operation(&task.operation) {
                Some(operation) => {
                    if let Err(reason) = operation.validate_parameters(&task.parameters) {
                        result.add_error(&format!("Task '{}': {}", task.name, reason));
                    }
                }
                None => {
                    result.add_error(&format!(
                        "Task '{}': unknown operation '{}' (available: {})",
                        task.name,
                        task.operation,
                        executor.operation_names().join(", ")
                    ));
                }
            }
        }

        Self::check_isolated_tasks(pipeline, &mut result);

        result
    }

    /// Warn about tasks with no edges at all in a multi-task pipeline
    fn check_isolated_tasks(pipeline: &Pipeline, result: &mut ValidationResult) {
        if pipeline.len() < 2 {
            return;
        }

        let dag = DagBuilder::build(pipeline);
        for task in pipeline.tasks() {
            let has_upstream = !task.upstream().is_empty();
            let has_downstream = dag
                .dependents(&task.name)
                .map(|d| !d.is_empty())
                .unwrap_or(false);

            if !has_upstream && !has_downstream {
                result.add_warning(&format!(
                    "Task '{}' has no dependencies and nothing depends on it",
                    task.name
                ));
            }
        }
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
