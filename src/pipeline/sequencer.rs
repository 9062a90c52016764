// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! Pipeline sequencer
//!
//! Drives the fixed stage order for one company run: interpolates each
//! stage command from run state, executes it through the process
//! runner, applies the retry policy, verifies expected artifacts, and
//! produces the terminal success/failure outcome. Stages run strictly
//! one at a time; the only concurrent piece is the supervised
//! background service, which is shut down on every exit path.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use regex::Regex;

use crate::config::{interpolate, CompanyProfile, ReadinessProbeConfig, RunConfig};
use crate::errors::{ReportflowError, ReportflowResult};
use crate::events::EventSink;
use crate::runner::{ProcessRunner, StageResult};
use crate::service::{ReadinessProbe, ServiceSupervisor};
use crate::storage::{ArtifactKind, StorageLayout};
use crate::upload::{extract_folder_id, Uploader};

use super::retry::{RetryDecision, RetryPolicy};
use super::stage::{FailureMode, StageSpec};

/// Number of top-level pipeline steps reported through step events
pub const TOTAL_STEPS: u32 = 10;

/// Accepted final-report naming conventions, in priority order
const FINAL_CONVENTIONS: [&str; 3] = [
    "final_dual_model_report_*.md",
    "final_responses_patched_report_*.md",
    "final_consolidated_report_*.md",
];

/// Terminal status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

/// Result of one complete pipeline run
#[derive(Debug)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Stage the run halted at, when failed
    pub failed_stage: Option<String>,
    /// Canonical final report artifact, when succeeded
    pub final_report: Option<PathBuf>,
    /// Absent when the soft-fail vector upload produced no id
    pub vector_store_id: Option<String>,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}

/// One execution of the report pipeline for a company
pub struct PipelineRun {
    company_name: String,
    profile: CompanyProfile,
    config: RunConfig,
    storage: StorageLayout,
    policy: RetryPolicy,
    sink: Arc<dyn EventSink>,
    uploader: Arc<dyn Uploader>,
    current_step: u32,
    status: RunStatus,
    vector_store_id: Option<String>,
    service_url: Option<String>,
    service: Option<ServiceSupervisor>,
}

impl PipelineRun {
    /// Create a run; directories are created when `run` starts
    pub fn new(
        company_name: &str,
        company_info: &str,
        config: RunConfig,
        sink: Arc<dyn EventSink>,
        uploader: Arc<dyn Uploader>,
    ) -> Self {
        let storage = StorageLayout::new(config.output_root(), company_name);
        let policy = RetryPolicy::new(Duration::from_secs(config.retry.delay_secs));

        Self {
            company_name: company_name.to_string(),
            profile: CompanyProfile::parse(company_info),
            config,
            storage,
            policy,
            sink,
            uploader,
            current_step: 0,
            status: RunStatus::Running,
            vector_store_id: None,
            service_url: None,
            service: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn storage(&self) -> &StorageLayout {
        &self.storage
    }

    /// Run the complete pipeline to its terminal outcome
    pub async fn run(&mut self) -> RunOutcome {
        let started = Instant::now();

        self.sink.info(&"=".repeat(60));
        self.sink
            .info(&format!("Starting pipeline for {}", self.company_name));
        self.sink.info(&"=".repeat(60));

        let result = self.execute_phases().await;

        // The service must not outlive the run, success or failure
        if let Some(mut service) = self.service.take() {
            service.shutdown().await;
        }

        let elapsed = started.elapsed();

        match result {
            Ok(final_report) => {
                self.status = RunStatus::Succeeded;
                self.sink
                    .metric("pipeline_duration", elapsed.as_secs() as i64, "seconds");
                self.sink
                    .info(&format!("PIPELINE COMPLETE: {}", self.company_name));
                self.sink
                    .info(&format!("Final report: {}", final_report.display()));

                RunOutcome {
                    status: RunStatus::Succeeded,
                    failed_stage: None,
                    final_report: Some(final_report),
                    vector_store_id: self.vector_store_id.clone(),
                    elapsed,
                }
            }
            Err(error) => {
                self.status = RunStatus::Failed;
                self.sink.error(&format!("Pipeline failed: {error}"));

                RunOutcome {
                    status: RunStatus::Failed,
                    failed_stage: failed_stage_of(&error),
                    final_report: None,
                    vector_store_id: self.vector_store_id.clone(),
                    elapsed,
                }
            }
        }
    }

    /// Execute the fixed phase order, halting on the first hard failure
    async fn execute_phases(&mut self) -> ReportflowResult<PathBuf> {
        self.storage.ensure_dirs()?;
        self.sink
            .metric("use_cases_count", self.config.use_cases_count as i64, "");

        self.step(1, "Preprocessing company data");
        self.run_stage(&StageSpec::preprocess(&self.config), &[]).await?;

        self.step(2, "Uploading to vector store");
        self.vector_upload_phase().await?;

        self.step(3, "Starting background service");
        self.start_service().await?;

        self.step(4, "Extracting and clustering quotes");
        self.run_stage(&StageSpec::extraction(&self.config), &[]).await?;

        self.step(5, "Running Part A analysis");
        self.run_stage(&StageSpec::part_a(&self.config), &[]).await?;
        if let Some(draft) = self.storage.latest(ArtifactKind::PartADraft) {
            self.sink
                .metric("part_a_length", draft.size() as i64, "bytes");
        }

        self.step(6, "Running Part B analysis");
        self.run_stage(&StageSpec::part_b(&self.config), &[]).await?;

        self.step(7, "Processing use cases");
        self.run_stage(&StageSpec::use_cases(&self.config), &[]).await?;

        self.step(8, "Enhancing Part B report");
        self.enhance_part_b().await?;

        self.step(9, "Running final consolidation");
        self.run_stage(&StageSpec::consolidation(&self.config), &[]).await?;

        self.step(10, "Finalizing report");
        self.finalize_report().await
    }

    fn step(&mut self, index: u32, message: &str) {
        self.current_step = index;
        self.sink.step(index, TOTAL_STEPS, message);
    }

    /// Run one stage through the retry loop
    ///
    /// Success requires exit code 0 and, when the stage declares an
    /// expected artifact kind, a present non-empty latest artifact of
    /// that kind. A clean exit without the artifact is a failure; a
    /// nonzero exit never becomes a success retroactively.
    async fn run_stage(
        &mut self,
        spec: &StageSpec,
        extra_vars: &[(&'static str, String)],
    ) -> ReportflowResult<StageResult> {
        let command = interpolate(&spec.command, &self.vars(extra_vars))?;
        let env = self.environment();
        let working_dir = self.config.working_dir();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.sink.info(&format!("Executing: {command}"));

            let result = ProcessRunner::execute(
                &command,
                &working_dir,
                &env,
                spec.timeout,
                attempt,
                self.sink.as_ref(),
            )
            .await;

            if result.success() {
                self.verify_artifact(spec)?;
                self.sink.info(&format!(
                    "Stage '{}' complete in {:.1}s (attempt {attempt})",
                    spec.name,
                    result.elapsed.as_secs_f64()
                ));
                return Ok(result);
            }

            // Log before any control-flow decision
            self.sink.error(&format!(
                "Stage '{}' attempt {attempt} failed (exit {}): {}",
                spec.name, result.exit_code, result.output
            ));

            match self.policy.decide(spec, &result, attempt) {
                RetryDecision::Retry { delay } => {
                    self.sink.warning(&format!(
                        "Transient failure in '{}'; retry {attempt}/{} after {}s",
                        spec.name,
                        spec.max_retries,
                        delay.as_secs()
                    ));
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    return Err(ReportflowError::stage_failed(
                        &spec.name,
                        attempt,
                        result.output,
                    ));
                }
            }
        }
    }

    fn verify_artifact(&self, spec: &StageSpec) -> ReportflowResult<()> {
        let Some(kind) = spec.expected_artifact else {
            return Ok(());
        };

        match self.storage.latest(kind) {
            Some(artifact) if artifact.is_present_non_empty() => Ok(()),
            _ => Err(ReportflowError::ArtifactMissing {
                stage: spec.name.clone(),
                kind: kind.name().to_string(),
            }),
        }
    }

    /// Soft-fail vector upload: the run continues without an id
    async fn vector_upload_phase(&mut self) -> ReportflowResult<()> {
        let spec = StageSpec::vector_upload(&self.config);

        let output = match self.run_stage(&spec, &[]).await {
            Ok(result) => Some(result.output),
            Err(error) => match spec.failure_mode {
                FailureMode::Soft => {
                    self.sink
                        .warning(&format!("Vector store upload failed: {error}"));
                    None
                }
                FailureMode::Hard => return Err(error),
            },
        };

        self.vector_store_id = self.resolve_vector_store_id(output.as_deref());

        match &self.vector_store_id {
            Some(id) => self.sink.info(&format!("Vector store ready: {id}")),
            None => self.sink.warning("Continuing without a vector store id"),
        }

        Ok(())
    }

    /// Resolve the vector store id from storage, else from stage output
    fn resolve_vector_store_id(&self, output: Option<&str>) -> Option<String> {
        if let Some(id) = self.storage.latest_vector_store_id() {
            return Some(id);
        }

        // Unwrap is fine: the pattern is a compile-time constant
        let re = Regex::new(r"vs_[a-zA-Z0-9]+").unwrap();
        let id = re.find(output?)?.as_str().to_string();

        if let Err(error) = self.storage.save_vector_store_id(&id) {
            self.sink
                .warning(&format!("Could not persist vector store id: {error}"));
        }

        Some(id)
    }

    /// Start the supervised background service and wait for readiness
    async fn start_service(&mut self) -> ReportflowResult<()> {
        let mut command = interpolate(&self.config.commands.service, &self.vars(&[]))?;
        if let Some(id) = &self.vector_store_id {
            command.push_str(&format!(" --vector-store-id {id}"));
        }

        let probe = match self.config.service.readiness {
            ReadinessProbeConfig::Tcp { timeout_secs } => ReadinessProbe::Tcp {
                port: self.config.service.port,
                timeout: Duration::from_secs(timeout_secs),
            },
            ReadinessProbeConfig::Delay { secs } => {
                ReadinessProbe::Delay(Duration::from_secs(secs))
            }
        };

        let env = self.environment();
        let supervisor =
            ServiceSupervisor::start(&command, &self.config.working_dir(), &env, probe).await?;
        self.service = Some(supervisor);

        let url = format!("http://localhost:{}/sse", self.config.service.port);
        self.sink.info(&format!("Service ready at {url}"));
        self.service_url = Some(url);

        Ok(())
    }

    /// Enhance the newest processed use-case report, if one exists
    async fn enhance_part_b(&mut self) -> ReportflowResult<()> {
        let pattern = format!(
            "{}/report_with_processed_use_cases_*.md",
            self.storage.part_b_dir().display()
        );

        let Some(input) = newest_match(&pattern) else {
            self.sink
                .warning("No processed use-case report found; skipping enhancement");
            return Ok(());
        };

        let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
        let output = self.storage.part_b_dir().join(format!(
            "report_enhanced_{}_{timestamp}.md",
            self.storage.company_slug()
        ));

        let extra = [
            ("input", input.display().to_string()),
            ("output", output.display().to_string()),
        ];
        self.run_stage(&StageSpec::enhance(&self.config), &extra).await?;

        Ok(())
    }

    /// Select, canonicalize, and (best-effort) upload the final report
    async fn finalize_report(&mut self) -> ReportflowResult<PathBuf> {
        let Some(source) = select_final_candidate(&self.storage.final_dir()) else {
            return Err(ReportflowError::ArtifactMissing {
                stage: "finalize".to_string(),
                kind: ArtifactKind::Final.name().to_string(),
            });
        };

        let content = fs::read_to_string(&source).map_err(|e| ReportflowError::FileReadError {
            path: source.clone(),
            error: e.to_string(),
        })?;

        let artifact = self.storage.save(ArtifactKind::Final, &content)?;
        self.sink
            .metric("final_report_size", content.len() as i64, "chars");
        self.sink
            .info(&format!("Final report saved: {}", artifact.path.display()));

        // Upload is best-effort; a failure never fails the run
        let folder = self.config.upload.drive_folder.trim().to_string();
        if folder.is_empty() {
            self.sink
                .warning("No upload destination configured; skipping upload");
        } else {
            let folder_id = extract_folder_id(&folder);
            if self.uploader.upload(&artifact.path, &folder_id).await {
                self.sink.info("Final report uploaded");
            } else {
                self.sink.warning("Final report upload failed; continuing");
            }
        }

        Ok(artifact.path)
    }

    /// Placeholder values for command-template interpolation
    fn vars(&self, extra: &[(&'static str, String)]) -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        vars.insert("company", self.company_name.clone());
        vars.insert("slug", self.storage.company_slug().to_string());
        vars.insert("data_dir", self.storage.data_dir().display().to_string());
        vars.insert(
            "output_dir",
            self.storage.company_root().display().to_string(),
        );
        vars.insert("part_b_dir", self.storage.part_b_dir().display().to_string());
        vars.insert(
            "vector_store_id",
            self.vector_store_id.clone().unwrap_or_default(),
        );
        vars.insert("use_cases", self.config.use_cases_count.to_string());
        vars.insert("model_set", self.config.model_set.to_string());
        vars.insert("port", self.config.service.port.to_string());

        for (key, value) in extra {
            vars.insert(key, value.clone());
        }

        vars
    }

    /// Environment injected into every stage process
    fn environment(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("COMPANY_NAME".into(), self.company_name.clone());
        env.insert("COMPANY_SLUG".into(), self.storage.company_slug().to_string());
        env.insert("MODEL_SET".into(), self.config.model_set.to_string());
        env.insert("NON_INTERACTIVE".into(), "1".into());
        env.insert(
            "USE_CASES_COUNT".into(),
            self.config.use_cases_count.to_string(),
        );
        env.insert(
            "COMPANY_DESCRIPTION".into(),
            self.profile.description.clone(),
        );
        env.insert("READINESS_SCORE".into(), self.profile.readiness_score.clone());
        env.insert(
            "READINESS_CATEGORY".into(),
            self.profile.readiness_category.clone(),
        );
        env.insert(
            "REPORT_EXPECTATIONS".into(),
            self.profile.report_expectations.clone(),
        );
        env.insert(
            "OUTPUT_DIR".into(),
            self.storage.company_root().display().to_string(),
        );
        env.insert("DATA_DIR".into(), self.storage.data_dir().display().to_string());
        env.insert(
            "QDRANT_COLLECTION".into(),
            format!("{}_quotes", self.company_name),
        );
        env.insert("DISABLE_CAFFEINATE".into(), "1".into());
        env.insert("DISABLE_TERMINAL_SPAWN".into(), "1".into());

        if let Some(url) = &self.service_url {
            env.insert("VECTOR_STORE_MCP_URL".into(), url.clone());
        }

        env
    }
}

/// Stage name associated with an error, for the run outcome
fn failed_stage_of(error: &ReportflowError) -> Option<String> {
    match error {
        ReportflowError::StageFailed { stage, .. }
        | ReportflowError::ArtifactMissing { stage, .. } => Some(stage.clone()),
        ReportflowError::ServiceLaunchFailed { .. } | ReportflowError::ServiceNotReady { .. } => {
            Some("service_start".to_string())
        }
        _ => None,
    }
}

/// Newest final-report candidate across the accepted naming conventions
///
/// Conventions are checked in priority order; within the first one that
/// matches, the newest by modification time wins, with the filename as
/// tie-break.
fn select_final_candidate(final_dir: &Path) -> Option<PathBuf> {
    for convention in FINAL_CONVENTIONS {
        let pattern = format!("{}/{convention}", final_dir.display());
        if let Some(path) = newest_match(&pattern) {
            return Some(path);
        }
    }
    None
}

/// Newest glob match by (mtime, name)
fn newest_match(pattern: &str) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = glob::glob(pattern)
        .ok()?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();

    matches.sort_by_key(|p| {
        let mtime = fs::metadata(p).and_then(|m| m.modified()).ok();
        (mtime, p.file_name().map(|n| n.to_os_string()))
    });

    matches.pop()
}
