// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! Storage command - inspect artifact storage

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::{OutputFormat, StorageAction};
use crate::config::RunConfig;
use crate::storage::StorageLayout;

/// Handle storage inspection actions
pub async fn run(action: StorageAction, _verbose: bool) -> Result<()> {
    match action {
        StorageAction::Stats {
            company,
            output_root,
            format,
        } => stats(&company, output_root, format),
        StorageAction::List {
            company,
            directory,
            output_root,
        } => list(&company, &directory, output_root),
    }
}

fn layout_for(company: &str, output_root: Option<PathBuf>) -> StorageLayout {
    let config = RunConfig {
        output_root,
        ..RunConfig::default()
    };
    StorageLayout::new(config.output_root(), company)
}

fn stats(company: &str, output_root: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let layout = layout_for(company, output_root);
    let stats = layout.stats();

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&stats)
                .map_err(|e| miette::miette!("Failed to serialize stats: {}", e))?;
            println!("{json}");
        }
        OutputFormat::Text => {
            println!();
            println!("{}: {}", "Storage".bold(), stats.company);
            println!("{}", "═".repeat(50));
            println!("  slug:           {}", stats.company_slug);
            println!("  total size:     {} bytes", stats.total_size_bytes);
            println!("  data files:     {}", stats.data_files);
            println!("  part A drafts:  {}", stats.part_a_drafts);
            println!("  part B reports: {}", stats.part_b_reports);
            println!("  final reports:  {}", stats.final_reports);
            println!();
        }
    }

    Ok(())
}

fn list(company: &str, directory: &str, output_root: Option<PathBuf>) -> Result<()> {
    let layout = layout_for(company, output_root);
    let files = layout.list_files(directory);

    if files.is_empty() {
        println!("No files in '{directory}'");
        return Ok(());
    }

    println!("{} file(s) in '{}':", files.len(), directory.bold());
    for file in files {
        println!("  - {}", file.display());
    }

    Ok(())
}
