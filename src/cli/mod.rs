// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for reportflow.

pub mod run;
pub mod storage;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ModelSet;

/// Report-generation pipeline orchestrator
///
/// Runs the multi-stage report pipeline for a company and manages its
/// artifact storage.
#[derive(Parser, Debug)]
#[clap(
    name = "reportflow",
    version,
    about = "Report-generation pipeline orchestrator",
    long_about = None,
    after_help = "Examples:\n\
        reportflow run \"Acme Corp\"             Run the full pipeline\n\
        reportflow run \"Acme Corp\" -c rf.yaml  Run with a config file\n\
        reportflow storage stats \"Acme Corp\"   Show storage statistics\n\n\
        See 'reportflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(id = "chdir", short = 'C', long = "directory", global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the complete pipeline for a company
    Run {
        /// Name of the company
        company_name: String,

        /// Formatted company information string
        #[clap(long, default_value = "")]
        company_info: String,

        /// Model set passed through to stage programs
        #[clap(long, value_enum, default_value_t = ModelSet::Gpt5)]
        model_set: ModelSet,

        /// Number of use cases to request
        #[clap(long, default_value_t = 7)]
        use_cases_count: u32,

        /// Configuration file (defaults apply when omitted)
        #[clap(short, long)]
        config: Option<PathBuf>,

        /// Override the storage root
        #[clap(long)]
        output_root: Option<PathBuf>,
    },

    /// Inspect artifact storage
    Storage {
        #[clap(subcommand)]
        action: StorageAction,
    },
}

/// Storage inspection actions
#[derive(Subcommand, Debug, Clone)]
pub enum StorageAction {
    /// Show storage statistics for a company
    Stats {
        /// Name of the company
        company: String,

        /// Override the storage root
        #[clap(long)]
        output_root: Option<PathBuf>,

        /// Output format (text, json)
        #[clap(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List files in one of the company directories
    List {
        /// Name of the company
        company: String,

        /// Directory (data, debug, part_a, part_b, final, vector_ids)
        #[clap(default_value = "data")]
        directory: String,

        /// Override the storage root
        #[clap(long)]
        output_root: Option<PathBuf>,
    },
}

/// Output format for storage stats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}
