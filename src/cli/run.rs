// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! Run command - execute the pipeline

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::load_pipeline;
use crate::pipeline::{
    DagBuilder, ExecutionOptions, Pipeline, PipelineExecutor, PipelineValidator, RunOutcome,
    RunResult, TaskStatus,
};
use crate::utils::create_spinner;

/// Run the pipeline
pub async fn run(
    pipeline_path: PathBuf,
    dry_run: bool,
    fail_fast: bool,
    jobs: usize,
    verbose: bool,
) -> Result<()> {
    let pipeline = load_pipeline(&pipeline_path)?;
    let executor = PipelineExecutor::with_default_operations();

    // Validate pipeline
    let validation = PipelineValidator::validate(&pipeline, &executor);

    if !validation.is_valid() {
        eprintln!("{}", "Pipeline validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        return Err(miette::miette!("Pipeline configuration is invalid"));
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Pipeline warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    // Check required operations are usable
    let missing = executor.check_operations(&pipeline).await;
    if !missing.is_empty() {
        eprintln!("{}", "Unavailable operations:".red().bold());
        for name in &missing {
            eprintln!("  {} {}", "✗".red(), name);
        }
        return Err(miette::miette!("Required operations are not available"));
    }

    print_execution_plan(&pipeline)?;

    let options = ExecutionOptions {
        dry_run,
        fail_fast,
        max_parallel: jobs,
    };

    let spinner = (!dry_run).then(|| create_spinner(&format!("Running {}...", pipeline.name())));
    let result = executor.run(&pipeline, &options).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let result = result?;

    print_report(&result, verbose);

    match result.outcome {
        RunOutcome::Success | RunOutcome::Partial => Ok(()),
        RunOutcome::Failure => match result.failure {
            Some(failure) => Err(miette::Report::new(failure.into_error())),
            None => Err(miette::miette!("Pipeline execution failed")),
        },
    }
}

/// Print the execution plan
fn print_execution_plan(pipeline: &Pipeline) -> Result<()> {
    let dag = DagBuilder::build(pipeline);
    let order = dag.topological_order()?;

    println!();
    println!("{}: {}", "Pipeline".bold(), pipeline.name());
    if let Some(schedule) = pipeline.schedule() {
        println!("{}: {}", "Schedule".bold(), schedule);
    }
    println!("{}", "═".repeat(50));
    println!(
        "Execution plan ({} task{}):",
        order.len(),
        if order.len() == 1 { "" } else { "s" }
    );
    println!();

    for (i, &idx) in order.iter().enumerate() {
        let task = &pipeline.tasks()[idx];
        print!("  {}. {} ({})", i + 1, task.name.bold(), task.operation);

        if !task.upstream().is_empty() {
            print!(" {}", format!("[depends: {}]", task.upstream().join(", ")).dimmed());
        }

        println!();
    }

    println!();
    Ok(())
}

/// Print per-task results and a summary line
fn print_report(result: &RunResult, verbose: bool) {
    if result.dry_run {
        println!("{}", "Dry run: no tasks were executed.".dimmed());
        return;
    }

    for record in &result.tasks {
        match record.status {
            TaskStatus::Succeeded => println!(
                "  {} {} ({:.2}s)",
                "✓".green(),
                record.name.bold(),
                record.duration.as_secs_f64()
            ),
            TaskStatus::Failed => {
                println!("  {} {} failed", "✗".red(), record.name.bold());
                if let Some(ref error) = record.error {
                    if verbose || result.outcome == RunOutcome::Failure {
                        println!("      {}", error.dimmed());
                    }
                }
            }
            TaskStatus::Skipped => {
                println!("  {} {} (skipped)", "○".dimmed(), record.name.dimmed())
            }
            TaskStatus::Pending | TaskStatus::Running => {
                println!("  {} {} ({})", "?".yellow(), record.name, record.status)
            }
        }
    }

    let secs = result.duration.as_secs_f64();
    println!();
    match result.outcome {
        RunOutcome::Success => println!(
            "{}",
            format!("Pipeline completed successfully in {:.2}s", secs).green()
        ),
        RunOutcome::Partial => println!(
            "{}",
            format!("Pipeline completed with tolerated failures in {:.2}s", secs).yellow()
        ),
        RunOutcome::Failure => println!("{}", format!("Pipeline failed after {:.2}s", secs).red()),
    }
}
