// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! Init command - write a starter pipeline

use colored::Colorize;
use miette::Result;
use std::path::Path;

use crate::errors::{DagflowError, DagflowResult};
use crate::pipeline::DEFAULT_PIPELINE_FILE;

/// Run the init command
pub async fn run(name: Option<String>, force: bool, verbose: bool) -> Result<()> {
    let pipeline_name = name.unwrap_or_else(|| {
        std::env::current_dir()
            .ok()
            .and_then(|p| p.file_name().map(|s| s.to_string_lossy().to_string()))
            .unwrap_or_else(|| "my-pipeline".to_string())
    });

    println!("{}", "Initializing dagflow pipeline...".bold());
    println!();

    let path = Path::new(DEFAULT_PIPELINE_FILE);
    if path.exists() && !force {
        return Err(miette::miette!(
            "{} already exists. Use --force to overwrite.",
            DEFAULT_PIPELINE_FILE
        ));
    }

    let content = generate_template(&pipeline_name)?;
    std::fs::write(path, &content).map_err(|e| DagflowError::FileWriteError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    println!("  {} Created {}", "✓".green(), DEFAULT_PIPELINE_FILE);
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to point at your databases and bucket", DEFAULT_PIPELINE_FILE.cyan());
    println!("  2. Run {} to check it", "dagflow validate".cyan());
    println!("  3. Run {} to execute the pipeline", "dagflow run".cyan());
    println!();

    if verbose {
        println!("{}", content.dimmed());
    }

    Ok(())
}

/// Extract two tables, stage them in the warehouse, then join them
///
/// The name usually comes from the directory name, so it is written as a
/// double-quoted scalar. A JSON string literal is valid YAML.
fn generate_template(name: &str) -> DagflowResult<String> {
    let name = serde_json::to_string(name)?;
    Ok(format!(
        r#"version: "1"
name: {name}
description: Extract posts and users, stage them, and materialize the joined table
schedule: "*/10 * * * *"

defaults:
  owner: dagflow
  bucket: demo-sample

tasks:
  - name: extract_posts_data
    operation: shell
    parameters:
      sql: SELECT * FROM stackoverflow_posts
      filename: so_posts.json
      command: >-
        mysql --batch -e "$DAGFLOW_PARAM_SQL" |
        gsutil cp - "gs://$DAGFLOW_PARAM_BUCKET/$DAGFLOW_PARAM_FILENAME"

  - name: extract_users_data
    operation: shell
    parameters:
      sql: SELECT * FROM stackoverflow_users
      filename: so_users.json
      command: >-
        psql -At -c "$DAGFLOW_PARAM_SQL" |
        gsutil cp - "gs://$DAGFLOW_PARAM_BUCKET/$DAGFLOW_PARAM_FILENAME"

  - name: move_users_data_to_staging
    operation: shell
    parameters:
      filename: so_users.json
      table: demo_temp.stackoverflow_users
      retries: 2
      retry_delay_secs: 15
      command: >-
        bq load --replace --source_format=NEWLINE_DELIMITED_JSON
        "$DAGFLOW_PARAM_TABLE" "gs://$DAGFLOW_PARAM_BUCKET/$DAGFLOW_PARAM_FILENAME"

  - name: move_posts_data_to_staging
    operation: shell
    parameters:
      filename: so_posts.json
      table: demo_temp.stackoverflow_posts
      command: >-
        bq load --replace --source_format=NEWLINE_DELIMITED_JSON
        "$DAGFLOW_PARAM_TABLE" "gs://$DAGFLOW_PARAM_BUCKET/$DAGFLOW_PARAM_FILENAME"

  - name: transform_and_load
    operation: shell
    parameters:
      table: demo.stackoverflow_data
      command: >-
        bq query --use_legacy_sql=false --replace --destination_table="$DAGFLOW_PARAM_TABLE"
        'SELECT p.owner_user_id AS user_id, u.display_name AS user_name,
        p.score AS post_score, p.title AS post_title
        FROM `demo_temp.stackoverflow_posts` AS p
        JOIN `demo_temp.stackoverflow_users` AS u ON p.owner_user_id = u.id'

chain:
  - extract_posts_data
  - extract_users_data
  - move_users_data_to_staging
  - move_posts_data_to_staging
  - transform_and_load
"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{DagBuilder, Pipeline, PipelineExecutor, PipelineValidator};

    #[test]
    fn test_template_is_a_valid_pipeline() {
        let pipeline = Pipeline::from_yaml(&generate_template("demo").unwrap()).unwrap();
        assert_eq!(pipeline.name(), "demo");
        assert_eq!(pipeline.len(), 5);

        let order = DagBuilder::build(&pipeline).topological_order_names().unwrap();
        assert_eq!(
            order,
            vec![
                "extract_posts_data",
                "extract_users_data",
                "move_users_data_to_staging",
                "move_posts_data_to_staging",
                "transform_and_load",
            ]
        );

        let validation =
            PipelineValidator::validate(&pipeline, &PipelineExecutor::with_default_operations());
        assert!(validation.is_valid(), "{:?}", validation.errors);
    }

    #[test]
    fn test_template_defaults_reach_tasks() {
        let pipeline = Pipeline::from_yaml(&generate_template("demo").unwrap()).unwrap();
        let task = pipeline.get_task("move_users_data_to_staging").unwrap();
        assert_eq!(task.parameter("bucket"), Some(&serde_json::json!("demo-sample")));
        assert_eq!(task.parameter("retries"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn test_template_name_survives_yaml_syntax() {
        for name in ["etl: prod", "#nightly", "[x]", "it's \"quoted\"", "- list"] {
            let pipeline = Pipeline::from_yaml(&generate_template(name).unwrap()).unwrap();
            assert_eq!(pipeline.name(), name);
            assert_eq!(pipeline.len(), 5);
        }
    }
}
