// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! Run command - execute the pipeline for one company

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{ModelSet, RunConfig};
use crate::events::TracingSink;
use crate::pipeline::{PipelineRun, TOTAL_STEPS};
use crate::upload::DisabledUploader;

/// Run the pipeline
#[allow(clippy::too_many_arguments)]
pub async fn run(
    company_name: String,
    company_info: String,
    model_set: ModelSet,
    use_cases_count: u32,
    config_path: Option<PathBuf>,
    output_root: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => RunConfig::from_file(&path)?,
        None => RunConfig::default(),
    };

    // CLI arguments win over the config file
    config.model_set = model_set;
    config.use_cases_count = use_cases_count;
    if let Some(root) = output_root {
        config.output_root = Some(root);
    }

    println!();
    println!("{}: {}", "Pipeline".bold(), company_name);
    println!("{}", "═".repeat(50));
    println!(
        "  model set: {}   use cases: {}   steps: {}",
        config.model_set, config.use_cases_count, TOTAL_STEPS
    );
    println!("  storage:   {}", config.output_root().display());
    if verbose {
        println!("  part_b retries: {} (delay {}s)", config.retry.part_b_max_retries, config.retry.delay_secs);
    }
    println!();

    let mut run = PipelineRun::new(
        &company_name,
        &company_info,
        config,
        Arc::new(TracingSink),
        Arc::new(DisabledUploader),
    );

    let outcome = run.run().await;

    println!();
    if outcome.succeeded() {
        println!(
            "{}",
            format!(
                "Pipeline completed successfully in {:.1}s",
                outcome.elapsed.as_secs_f64()
            )
            .green()
        );
        if let Some(report) = &outcome.final_report {
            println!("  final report: {}", report.display());
        }
        if let Some(id) = &outcome.vector_store_id {
            println!("  vector store: {id}");
        }
        Ok(())
    } else {
        println!(
            "{}",
            format!("Pipeline failed after {:.1}s", outcome.elapsed.as_secs_f64()).red()
        );
        if let Some(stage) = &outcome.failed_stage {
            eprintln!("  {} halted at stage '{}'", "✗".red(), stage.bold());
        }
        Err(miette::miette!(
            "Pipeline run failed for '{}'",
            company_name
        ))
    }
}
