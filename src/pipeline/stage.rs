// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! Stage records
//!
//! Each pipeline stage is a plain data record — command template,
//! timeout, retry budget, transient-failure signature, failure mode,
//! expected artifact kind — processed uniformly by the sequencer loop.
//! The stage programs themselves are opaque; the orchestrator only
//! observes exit codes and captured output.

use std::time::Duration;

use crate::config::RunConfig;
use crate::storage::ArtifactKind;

/// Whether a stage failure halts the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Failure halts the run immediately
    Hard,
    /// Failure is logged and the run continues
    Soft,
}

/// Signature identifying a failure as transient
///
/// Matches when the captured output contains every marker. The detector
/// is deliberately narrow so non-transient errors are never masked by
/// blind retrying; it lives on the stage record so callers can swap in
/// a different classifier without touching the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientSignature {
    all_of: Vec<String>,
}

impl TransientSignature {
    /// Signature that never matches
    pub fn none() -> Self {
        Self { all_of: Vec::new() }
    }

    /// Match output containing all of the given markers
    pub fn all_of(markers: &[&str]) -> Self {
        Self {
            all_of: markers.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// The upstream server-error signature observed in production
    pub fn server_error() -> Self {
        Self::all_of(&["Error code: 500", "server_error"])
    }

    /// Whether the captured output matches this signature
    pub fn matches(&self, output: &str) -> bool {
        !self.all_of.is_empty() && self.all_of.iter().all(|m| output.contains(m))
    }
}

/// One ordered unit of pipeline work executed as an external command
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub name: String,
    /// Command template with `{placeholder}` markers
    pub command: String,
    pub timeout: Duration,
    /// Extra attempts allowed beyond the first
    pub max_retries: u32,
    pub transient: TransientSignature,
    pub failure_mode: FailureMode,
    /// Artifact kind that must be present and non-empty for success
    pub expected_artifact: Option<ArtifactKind>,
}

impl StageSpec {
    fn new(name: &str, command: &str, timeout_secs: u64) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            timeout: Duration::from_secs(timeout_secs),
            max_retries: 0,
            transient: TransientSignature::none(),
            failure_mode: FailureMode::Hard,
            expected_artifact: None,
        }
    }

    /// Preprocess the company data folder
    pub fn preprocess(config: &RunConfig) -> Self {
        Self::new("preprocess", &config.commands.preprocess, config.timeouts.default_secs)
    }

    /// Upload company data to the vector store (soft-fail)
    pub fn vector_upload(config: &RunConfig) -> Self {
        let mut spec = Self::new(
            "vector_upload",
            &config.commands.vector_upload,
            config.timeouts.default_secs,
        );
        spec.failure_mode = FailureMode::Soft;
        spec
    }

    /// Extract and cluster quotes
    pub fn extraction(config: &RunConfig) -> Self {
        Self::new("extraction", &config.commands.extraction, config.timeouts.default_secs)
    }

    /// Part A analysis; must produce a draft artifact
    pub fn part_a(config: &RunConfig) -> Self {
        let mut spec = Self::new("part_a", &config.commands.part_a, config.timeouts.part_a_secs);
        spec.expected_artifact = Some(ArtifactKind::PartADraft);
        spec
    }

    /// Part B analysis; retried on the transient server-error signature
    pub fn part_b(config: &RunConfig) -> Self {
        let mut spec = Self::new("part_b", &config.commands.part_b, config.timeouts.part_b_secs);
        spec.max_retries = config.retry.part_b_max_retries;
        spec.transient = TransientSignature::server_error();
        spec
    }

    /// Use-case processing after Part B
    pub fn use_cases(config: &RunConfig) -> Self {
        Self::new("use_cases", &config.commands.use_cases, config.timeouts.default_secs)
    }

    /// Part B enhancement; must produce an enhanced report artifact
    pub fn enhance(config: &RunConfig) -> Self {
        let mut spec = Self::new("enhance", &config.commands.enhance, config.timeouts.default_secs);
        spec.expected_artifact = Some(ArtifactKind::PartBReport);
        spec
    }

    /// Final consolidation
    pub fn consolidation(config: &RunConfig) -> Self {
        Self::new(
            "consolidation",
            &config.commands.consolidation,
            config.timeouts.consolidation_secs,
        )
    }
}
