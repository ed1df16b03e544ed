// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! Validate command - check pipeline configuration

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::pipeline::{Pipeline, PipelineExecutor, PipelineValidator};
use crate::utils::{print_error, print_section, print_success, print_warning};

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    // Definition errors (duplicates, unknown tasks, cycles) surface here
    let pipeline = match Pipeline::from_file(&pipeline_path) {
        Ok(p) => p,
        Err(e) => {
            if e.is_definition_error() {
                print_error("Pipeline definition is invalid");
            } else {
                print_error("Failed to load pipeline");
            }
            println!();
            return Err(miette::Report::new(e));
        }
    };

    print_success("Pipeline definition is well-formed and acyclic");

    let executor = PipelineExecutor::with_default_operations();
    let validation = PipelineValidator::validate(&pipeline, &executor);

    if !validation.errors.is_empty() {
        print_section(&"Errors".red().bold().to_string());
        for error in &validation.errors {
            print_error(error);
        }
    }

    if !validation.warnings.is_empty() {
        print_section(&"Warnings".yellow().bold().to_string());
        for warning in &validation.warnings {
            print_warning(warning);
        }
    }

    if verbose {
        print_section("Pipeline summary");
        println!("  Name: {}", pipeline.name());
        if let Some(schedule) = pipeline.schedule() {
            println!("  Schedule: {}", schedule);
        }
        println!("  Tasks: {}", pipeline.len());
        for task in pipeline.tasks() {
            let deps = if task.upstream().is_empty() {
                String::new()
            } else {
                format!(" [depends: {}]", task.upstream().join(", "))
            };
            println!("    - {} ({}){}", task.name, task.operation, deps.dimmed());
        }
    }

    println!();

    if !validation.is_valid() {
        Err(miette::miette!("Pipeline validation failed"))
    } else if validation.has_warnings() {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
        Ok(())
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
        Ok(())
    }
}
