// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for dagflow.

pub mod graph;
pub mod init;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::pipeline::{Pipeline, DEFAULT_PIPELINE_FILE};

/// Workflow DAG runner
///
/// Define tasks, declare what runs after what, and execute in order.
#[derive(Parser, Debug)]
#[clap(
    name = "dagflow",
    version,
    about = "Run a pipeline of tasks in dependency order",
    long_about = None,
    after_help = "Examples:\n\
        dagflow init                    Write a starter .dagflow.yaml\n\
        dagflow validate                Check the pipeline definition\n\
        dagflow graph -f mermaid        Show the dependency graph\n\
        dagflow run                     Execute the pipeline\n\n\
        See 'dagflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter pipeline file
    Init {
        /// Pipeline name (defaults to current directory name)
        name: Option<String>,

        /// Overwrite an existing pipeline file
        #[clap(long)]
        force: bool,
    },

    /// Run the pipeline
    Run {
        /// Pipeline file
        #[clap(short, long, default_value = DEFAULT_PIPELINE_FILE, env = "DAGFLOW_PIPELINE")]
        pipeline: PathBuf,

        /// Show the execution plan without running anything
        #[clap(long)]
        dry_run: bool,

        /// Stop starting new tasks after the first failure
        #[clap(long)]
        fail_fast: bool,

        /// Maximum number of tasks to run at once
        #[clap(short = 'j', long, default_value = "1", env = "DAGFLOW_MAX_PARALLEL")]
        jobs: usize,
    },

    /// Validate pipeline configuration
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = DEFAULT_PIPELINE_FILE, env = "DAGFLOW_PIPELINE")]
        pipeline: PathBuf,
    },

    /// Show pipeline as a graph
    Graph {
        /// Pipeline file
        #[clap(default_value = DEFAULT_PIPELINE_FILE, env = "DAGFLOW_PIPELINE")]
        pipeline: PathBuf,

        /// Output format
        #[clap(short, long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Load a pipeline file, mapping errors to diagnostics
pub(crate) fn load_pipeline(path: &std::path::Path) -> miette::Result<Pipeline> {
    Pipeline::from_file(path).map_err(miette::Report::new)
}
