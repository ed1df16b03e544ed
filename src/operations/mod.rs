// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! Task operations
//!
//! An operation is the unit of work behind a task. The executor hands it the
//! task's parameter bag and only looks at whether it succeeded; anything
//! else (connections, retries, formats) is the operation's business.

mod noop;
mod shell;

pub use noop::NoopOperation;
pub use shell::ShellOperation;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::pipeline::Parameters;

/// Failure reported by an operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct OperationError {
    pub message: String,
}

impl OperationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for OperationError {
    fn from(e: anyhow::Error) -> Self {
        Self::new(format!("{:#}", e))
    }
}

/// Trait for task operations
#[async_trait]
pub trait Operation: Send + Sync {
    /// Perform the external effect once
    async fn execute(&self, parameters: &Parameters) -> Result<(), OperationError>;

    /// Check that whatever the operation needs for this task is present
    async fn check_available(&self, _parameters: &Parameters) -> bool {
        true
    }

    /// Reject parameter bags the operation cannot work with
    fn validate_parameters(&self, _parameters: &Parameters) -> Result<(), String> {
        Ok(())
    }
}

/// Operation backed by a closure
pub struct FnOperation<F> {
    f: F,
}

#[async_trait]
impl<F> Operation for FnOperation<F>
where
    F: Fn(&Parameters) -> Result<(), OperationError> + Send + Sync,
{
    async fn execute(&self, parameters: &Parameters) -> Result<(), OperationError> {
        (self.f)(parameters)
    }
}

/// Wrap a closure as an operation
pub fn from_fn<F>(f: F) -> FnOperation<F>
where
    F: Fn(&Parameters) -> Result<(), OperationError> + Send + Sync,
{
    FnOperation { f }
}

/// Read a non-negative integer parameter, falling back to `default`
pub fn integer_parameter(parameters: &Parameters, key: &str, default: u64) -> Result<u64, String> {
    match parameters.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| format!("parameter '{}' must be a non-negative integer", key)),
    }
}

/// Read a string parameter
pub fn string_parameter<'a>(parameters: &'a Parameters, key: &str) -> Option<&'a str> {
    parameters.get(key).and_then(|v| v.as_str())
}

/// Create the registry of built-in operations
pub fn create_default_operations() -> HashMap<String, Arc<dyn Operation>> {
    let mut operations: HashMap<String, Arc<dyn Operation>> = HashMap::new();
    operations.insert("shell".to_string(), Arc::new(ShellOperation::new()));
    operations.insert("noop".to_string(), Arc::new(NoopOperation));
    operations
}
