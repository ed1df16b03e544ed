// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! Pipeline definition structures
//!
//! A [`Pipeline`] is built explicitly: tasks are registered with
//! [`Pipeline::define_task`] and wired with [`Pipeline::declare_dependency`].
//! Both reject input that would break the pipeline invariants (unique names,
//! known upstreams, no cycles), so a constructed pipeline is always runnable.
//!
//! Pipelines can also be loaded from `.dagflow.yaml` (or `.toml`) files,
//! which go through the same definition calls.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::OnceLock;

use crate::errors::{DagflowError, DagflowResult};
use crate::pipeline::DagBuilder;

/// Parameter bag handed to a task's operation
pub type Parameters = BTreeMap<String, serde_json::Value>;

/// Default pipeline file name
pub const DEFAULT_PIPELINE_FILE: &str = ".dagflow.yaml";

fn task_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("task name pattern is valid")
    })
}

/// A single unit of work in a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Task name (unique within the pipeline)
    pub name: String,

    /// Operation kind used to execute this task (e.g. `shell`)
    pub operation: String,

    /// Parameters passed to the operation, with pipeline defaults merged in
    pub parameters: Parameters,

    /// Task description
    pub description: Option<String>,

    /// Record failure but let dependents run anyway
    pub allow_failure: bool,

    upstream: Vec<String>,
}

impl Task {
    /// Create a task that is not yet part of any pipeline
    pub fn new(
        name: impl Into<String>,
        operation: impl Into<String>,
        parameters: Parameters,
    ) -> Self {
        Self {
            name: name.into(),
            operation: operation.into(),
            parameters,
            description: None,
            allow_failure: false,
            upstream: Vec::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Let the pipeline continue past a failure of this task
    pub fn with_allow_failure(mut self, allow: bool) -> Self {
        self.allow_failure = allow;
        self
    }

    /// Names of the tasks this task runs after, in declaration order
    pub fn upstream(&self) -> &[String] {
        &self.upstream
    }

    /// Look up a parameter
    pub fn parameter(&self, key: &str) -> Option<&serde_json::Value> {
        self.parameters.get(key)
    }
}

/// A validated set of tasks and their dependency edges
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    name: String,
    description: Option<String>,
    schedule: Option<String>,
    defaults: Parameters,
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the schedule expression (informational, e.g. `*/10 * * * *`)
    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    /// Set parameters merged under every task defined afterwards
    pub fn with_defaults(mut self, defaults: Parameters) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn schedule(&self) -> Option<&str> {
        self.schedule.as_deref()
    }

    pub fn defaults(&self) -> &Parameters {
        &self.defaults
    }

    /// Tasks in declaration order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Get a task by name
    pub fn get_task(&self, name: &str) -> Option<&Task> {
        self.index.get(name).map(|&idx| &self.tasks[idx])
    }

    /// Declaration index of a task
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Get all task names in declaration order
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    /// Register a task
    ///
    /// Fails with [`DagflowError::DuplicateTask`] if the name is taken; the
    /// existing definition is left untouched.
    pub fn define_task(
        &mut self,
        name: impl Into<String>,
        operation: impl Into<String>,
        parameters: Parameters,
    ) -> DagflowResult<&Task> {
        self.add_task(Task::new(name, operation, parameters))
    }

    /// Register a pre-built task (description, allow_failure, ...)
    ///
    /// Any upstream names already present on the task are ignored; edges are
    /// only created through [`Pipeline::declare_dependency`].
    pub fn add_task(&mut self, mut task: Task) -> DagflowResult<&Task> {
        if !task_name_pattern().is_match(&task.name) {
            return Err(DagflowError::InvalidTaskName { task: task.name });
        }
        if self.index.contains_key(&task.name) {
            return Err(DagflowError::DuplicateTask { task: task.name });
        }

        let mut parameters = self.defaults.clone();
        parameters.extend(std::mem::take(&mut task.parameters));
        task.parameters = parameters;
        task.upstream.clear();

        let idx = self.tasks.len();
        self.index.insert(task.name.clone(), idx);
        self.tasks.push(task);

        tracing::debug!(pipeline = %self.name, task = %self.tasks[idx].name, "defined task");
        Ok(&self.tasks[idx])
    }

    /// Record that `downstream` must not start until `upstream` has succeeded
    ///
    /// The edge is checked before it is accepted: both tasks must exist and
    /// `upstream` must not already be reachable from `downstream`. On error
    /// the graph is unchanged. Declaring an existing edge again is a no-op.
    pub fn declare_dependency(&mut self, upstream: &str, downstream: &str) -> DagflowResult<()> {
        let up = self.position(upstream).ok_or_else(|| DagflowError::UnknownTask {
            task: upstream.to_string(),
        })?;
        let down = self.position(downstream).ok_or_else(|| DagflowError::UnknownTask {
            task: downstream.to_string(),
        })?;

        if up == down {
            return Err(DagflowError::Cycle {
                path: vec![upstream.to_string(), downstream.to_string()],
            });
        }

        if self.tasks[down].upstream.iter().any(|u| u == upstream) {
            return Ok(());
        }

        if let Some(existing) = DagBuilder::build(self).path_between(downstream, upstream) {
            let mut path = vec![upstream.to_string()];
            path.extend(existing);
            return Err(DagflowError::Cycle { path });
        }

        self.tasks[down].upstream.push(upstream.to_string());
        tracing::debug!(pipeline = %self.name, %upstream, %downstream, "declared dependency");
        Ok(())
    }

    /// Declare `names[0] -> names[1] -> ...`, stopping at the first error
    pub fn chain<S: AsRef<str>>(&mut self, names: &[S]) -> DagflowResult<()> {
        for pair in names.windows(2) {
            self.declare_dependency(pair[0].as_ref(), pair[1].as_ref())?;
        }
        Ok(())
    }

    /// Load pipeline from a YAML or TOML file (chosen by extension)
    pub fn from_file(path: &Path) -> DagflowResult<Self> {
        if !path.exists() {
            return Err(DagflowError::PipelineNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DagflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let file = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => PipelineFile::from_toml(&content)?,
            _ => PipelineFile::from_yaml(&content)?,
        };

        file.into_pipeline()
    }

    /// Parse pipeline from YAML string
    pub fn from_yaml(yaml: &str) -> DagflowResult<Self> {
        PipelineFile::from_yaml(yaml)?.into_pipeline()
    }

    /// Parse pipeline from TOML string
    pub fn from_toml(content: &str) -> DagflowResult<Self> {
        PipelineFile::from_toml(content)?.into_pipeline()
    }
}

/// On-disk pipeline description (`.dagflow.yaml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineFile {
    /// File format version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Pipeline name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Cron-style schedule; recorded, not interpreted
    #[serde(default)]
    pub schedule: Option<String>,

    /// Parameters merged under every task's own parameters
    #[serde(default)]
    pub defaults: Parameters,

    /// Tasks in declaration order
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,

    /// Shorthand for a linear run of dependencies
    #[serde(default)]
    pub chain: Vec<String>,
}

fn default_version() -> String {
    "1".to_string()
}

/// A task as written in a pipeline file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEntry {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub operation: String,

    #[serde(default)]
    pub parameters: Parameters,

    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub allow_failure: bool,
}

impl PipelineFile {
    pub fn from_yaml(yaml: &str) -> DagflowResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    pub fn from_toml(content: &str) -> DagflowResult<Self> {
        toml::from_str(content).map_err(Into::into)
    }

    /// Build the pipeline: define every task, then declare `depends_on`
    /// edges, then the `chain` edges
    pub fn into_pipeline(self) -> DagflowResult<Pipeline> {
        if self.version != "1" {
            return Err(DagflowError::InvalidPipeline {
                reason: format!("unsupported version '{}'", self.version),
                help: Some("Set `version: \"1\"` or remove the field".into()),
            });
        }

        let mut pipeline = Pipeline::new(self.name).with_defaults(self.defaults);
        pipeline.description = self.description;
        pipeline.schedule = self.schedule;

        let mut edges = Vec::new();
        for entry in self.tasks {
            let mut task = Task::new(entry.name, entry.operation, entry.parameters)
                .with_allow_failure(entry.allow_failure);
            task.description = entry.description;

            for dep in entry.depends_on {
                edges.push((dep, task.name.clone()));
            }
            pipeline.add_task(task)?;
        }

        for (upstream, downstream) in &edges {
            pipeline.declare_dependency(upstream, downstream)?;
        }

        pipeline.chain(self.chain.as_slice())?;

        Ok(pipeline)
    }
}
