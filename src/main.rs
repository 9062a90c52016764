// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! reportflow - Report-Generation Pipeline Orchestrator
//!
//! Runs the multi-stage report pipeline for a company.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reportflow::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reportflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Run {
            company_name,
            company_info,
            model_set,
            use_cases_count,
            config,
            output_root,
        } => {
            reportflow::cli::run::run(
                company_name,
                company_info,
                model_set,
                use_cases_count,
                config,
                output_root,
                cli.verbose,
            )
            .await
        }
        Commands::Storage { action } => reportflow::cli::storage::run(action, cli.verbose).await,
    }
}
