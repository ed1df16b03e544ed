// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! Shell operation
//!
//! Runs the `command` parameter through a shell. Scalar parameters are
//! exported to the command as `DAGFLOW_PARAM_<KEY>` environment variables,
//! so a task can hand its SQL, bucket or table name to a vendor CLI. The
//! `command` and `shell` keys drive the operation itself and are not
//! exported. Two keys that map to the same variable name (`schema-fields`
//! and `schema_fields`) are rejected.
//!
//! Retries are the operation's own policy: `retries` extra attempts, with
//! `retry_delay_secs` between them.

use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::process::Command;

use super::{integer_parameter, string_parameter, Operation, OperationError};
use crate::pipeline::Parameters;

const DEFAULT_SHELL: &str = "bash";

/// Parameters consumed by the operation rather than the command
const CONTROL_KEYS: &[&str] = &["command", "shell"];

/// Shell operation
pub struct ShellOperation;

impl ShellOperation {
    /// Create a new shell operation
    pub fn new() -> Self {
        Self
    }

    /// Environment handed to the command
    ///
    /// Fails if two parameter keys map to the same variable name.
    pub fn parameter_env(parameters: &Parameters) -> Result<HashMap<String, String>, String> {
        let mut env = HashMap::new();
        let mut sources: HashMap<String, &str> = HashMap::new();

        for (key, value) in parameters {
            if CONTROL_KEYS.contains(&key.as_str()) {
                continue;
            }
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            let name = format!("DAGFLOW_PARAM_{}", env_suffix(key));
            if let Some(previous) = sources.insert(name.clone(), key) {
                return Err(format!(
                    "parameters '{}' and '{}' both map to {}",
                    previous, key, name
                ));
            }
            env.insert(name, value);
        }

        Ok(env)
    }

    fn shell(parameters: &Parameters) -> &str {
        string_parameter(parameters, "shell").unwrap_or(DEFAULT_SHELL)
    }

    async fn run_once(
        &self,
        shell: &str,
        command: &str,
        env: &HashMap<String, String>,
    ) -> Result<(), OperationError> {
        let output = Command::new(shell)
            .arg("-c")
            .arg(command)
            .envs(env)
            .output()
            .await
            .with_context(|| format!("failed to spawn shell '{}'", shell))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(stdout = %stdout.trim_end(), "command output");
        }

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            let mut message = format!("command exited with status {}", exit_code);
            if !stderr.trim().is_empty() {
                message.push_str(": ");
                message.push_str(stderr.trim());
            }
            Err(OperationError::new(message))
        }
    }
}

fn env_suffix(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

impl Default for ShellOperation {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for ShellOperation {
    async fn execute(&self, parameters: &Parameters) -> Result<(), OperationError> {
        self.validate_parameters(parameters).map_err(OperationError::new)?;

        let command = string_parameter(parameters, "command").unwrap_or_default();
        let shell = Self::shell(parameters);
        let retries = integer_parameter(parameters, "retries", 0).map_err(OperationError::new)?;
        let delay =
            integer_parameter(parameters, "retry_delay_secs", 0).map_err(OperationError::new)?;
        let env = Self::parameter_env(parameters).map_err(OperationError::new)?;

        let mut attempt = 0;
        loop {
            match self.run_once(shell, command, &env).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        retries,
                        error = %e,
                        "command failed, retrying in {}s",
                        delay
                    );
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                }
                Err(e) if attempt > 0 => {
                    return Err(OperationError::new(format!(
                        "{} (after {} retries)",
                        e.message, attempt
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn check_available(&self, parameters: &Parameters) -> bool {
        which::which(Self::shell(parameters)).is_ok()
    }

    fn validate_parameters(&self, parameters: &Parameters) -> Result<(), String> {
        match string_parameter(parameters, "command") {
            Some(command) if !command.trim().is_empty() => {}
            Some(_) => return Err("shell command is empty".to_string()),
            None => return Err("missing string parameter 'command'".to_string()),
        }

        if let Some(shell) = parameters.get("shell") {
            if !shell.is_string() {
                return Err("parameter 'shell' must be a string".to_string());
            }
        }

        integer_parameter(parameters, "retries", 0)?;
        integer_parameter(parameters, "retry_delay_secs", 0)?;
        Self::parameter_env(parameters)?;
        Ok(())
    }
}
