// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! Error types
//!
//! Failures that belong to a single stage attempt (launch errors,
//! timeouts, nonzero exits) are encoded in [`crate::runner::StageResult`]
//! and never surface here. This module covers everything the
//! orchestrator itself can get wrong: configuration, storage, the
//! supervised service, and the terminal run outcome.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for reportflow operations
pub type ReportflowResult<T> = Result<T, ReportflowError>;

/// Main error type for reportflow
#[derive(Error, Debug, Diagnostic)]
pub enum ReportflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Stage Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Stage '{stage}' failed after {attempts} attempt(s)")]
    #[diagnostic(code(reportflow::stage_failed))]
    StageFailed {
        stage: String,
        attempts: u32,
        output: String,
        #[help]
        help: Option<String>,
    },

    #[error("Stage '{stage}' exited cleanly but produced no '{kind}' artifact")]
    #[diagnostic(
        code(reportflow::artifact_missing),
        help("Check the stage program's output directory wiring; a zero exit code without the expected artifact is treated as failure")
    )]
    ArtifactMissing { stage: String, kind: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Service Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Background service failed to launch: {error}")]
    #[diagnostic(code(reportflow::service_launch_failed))]
    ServiceLaunchFailed {
        error: String,
        #[help]
        help: Option<String>,
    },

    #[error("Background service did not become ready within {waited_secs}s")]
    #[diagnostic(
        code(reportflow::service_not_ready),
        help("Later stages depend on this service; increase the readiness timeout or check the service command")
    )]
    ServiceNotReady { waited_secs: u64 },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(reportflow::config_not_found),
        help("Pass --config with a valid path, or omit it to use the built-in defaults")
    )]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid configuration: {reason}")]
    #[diagnostic(code(reportflow::invalid_config))]
    InvalidConfig {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Unresolved placeholder '{{{placeholder}}}' in command template")]
    #[diagnostic(
        code(reportflow::unresolved_placeholder),
        help("Known placeholders: company, slug, data_dir, output_dir, part_b_dir, vector_store_id, use_cases, model_set, port, input, output")
    )]
    UnresolvedPlaceholder { placeholder: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Storage error: {message}")]
    #[diagnostic(code(reportflow::storage_error))]
    Storage { message: String },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(reportflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(reportflow::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Run Outcome
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline run for '{company}' failed at stage '{stage}'")]
    #[diagnostic(code(reportflow::run_failed))]
    RunFailed {
        company: String,
        stage: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(reportflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(reportflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(reportflow::json_error))]
    Json { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(reportflow::glob_error))]
    GlobPattern { message: String },
}

impl From<std::io::Error> for ReportflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for ReportflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for ReportflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<glob::PatternError> for ReportflowError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl ReportflowError {
    /// Create a stage failure with a hint derived from the captured output
    pub fn stage_failed(stage: &str, attempts: u32, output: String) -> Self {
        let help = Self::hint_for_output(&output);
        Self::StageFailed {
            stage: stage.to_string(),
            attempts,
            output,
            help,
        }
    }

    /// Derive a help message from well-known failure markers
    fn hint_for_output(output: &str) -> Option<String> {
        if output == "TIMEOUT" {
            Some("The stage exceeded its wall-clock timeout and was killed. Consider raising the stage timeout.".into())
        } else if output.contains("command not found") || output.contains("No such file") {
            Some("The stage command could not be launched. Check the command template and PATH.".into())
        } else if output.contains("server_error") {
            Some("Upstream server error. This signature is retried when the stage has retry budget left.".into())
        } else {
            None
        }
    }
}
