// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! dagflow - Workflow DAG Runner
//!
//! Run a pipeline of tasks in dependency order.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dagflow::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dagflow=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    dagflow::utils::configure_colors();

    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Init { name, force } => dagflow::cli::init::run(name, force, cli.verbose).await,
        Commands::Run {
            pipeline,
            dry_run,
            fail_fast,
            jobs,
        } => dagflow::cli::run::run(pipeline, dry_run, fail_fast, jobs, cli.verbose).await,
        Commands::Validate { pipeline } => {
            dagflow::cli::validate::run(pipeline, cli.verbose).await
        }
        Commands::Graph { pipeline, format } => {
            dagflow::cli::graph::run(pipeline, format, cli.verbose).await
        }
    }
}
