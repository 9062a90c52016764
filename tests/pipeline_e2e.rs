// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! End-to-end pipeline scenarios
//!
//! Stage programs are stand-in shell snippets that write
//! convention-named artifacts into a temporary storage tree, so these
//! tests exercise the real sequencer, runner, retry policy, and storage
//! resolution together.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use reportflow::config::{ReadinessProbeConfig, RunConfig, StageCommands};
use reportflow::events::MemorySink;
use reportflow::pipeline::{PipelineRun, TOTAL_STEPS};
use reportflow::storage::ArtifactKind;
use reportflow::upload::DisabledUploader;

const COMPANY: &str = "Acme Corp";
const SLUG: &str = "acme_corp";

/// Stage commands where every stage succeeds and writes its artifact
fn happy_commands() -> StageCommands {
    StageCommands {
        preprocess: "true".into(),
        vector_upload: r#"echo "created vs_test123abc""#.into(),
        service: "sleep 30".into(),
        extraction: "true".into(),
        part_a: format!(
            r#"printf 'draft body' > "{{output_dir}}/part_a/report_draft_{SLUG}_20240101-000000.md""#
        ),
        part_b: "true".into(),
        use_cases: format!(
            r#"printf 'use cases' > "{{part_b_dir}}/report_with_processed_use_cases_{SLUG}_1.md""#
        ),
        enhance: r#"cp "{input}" "{output}""#.into(),
        consolidation: format!(
            r#"printf 'final body' > "{{output_dir}}/final/final_dual_model_report_{SLUG}_1.md""#
        ),
    }
}

fn base_config(root: &Path) -> RunConfig {
    let mut config = RunConfig::default();
    config.output_root = Some(root.to_path_buf());
    config.working_dir = Some(root.to_path_buf());
    config.commands = happy_commands();
    config.retry.delay_secs = 0;
    config.service.readiness = ReadinessProbeConfig::Delay { secs: 0 };
    config.upload.drive_folder = String::new();
    config
}

fn make_run(config: RunConfig, sink: Arc<MemorySink>) -> PipelineRun {
    PipelineRun::new(COMPANY, "", config, sink, Arc::new(DisabledUploader))
}

#[tokio::test]
async fn scenario_a_all_stages_succeed() {
    let temp = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::new());
    let mut run = make_run(base_config(temp.path()), sink.clone());

    let outcome = run.run().await;

    assert!(outcome.succeeded(), "outcome: {outcome:?}");
    assert!(outcome.failed_stage.is_none());

    // Final artifact present, canonical copy byte-equal to the source
    let report = outcome.final_report.expect("final report path");
    assert_eq!(fs::read_to_string(&report).unwrap(), "final body");
    let latest = run.storage().latest(ArtifactKind::Final).unwrap();
    assert_eq!(latest.read().unwrap(), "final body");

    // Ready signal exists next to the canonical artifact
    assert!(report.with_extension("ready").is_file());

    // Vector id recovered from the upload stage's output
    assert_eq!(outcome.vector_store_id.as_deref(), Some("vs_test123abc"));

    // Step events emitted in order 1..N with no gaps
    let steps = sink.step_indices();
    assert_eq!(steps, (1..=TOTAL_STEPS).collect::<Vec<_>>());
}

#[tokio::test]
async fn scenario_b_part_a_failure_halts_run() {
    let temp = TempDir::new().unwrap();
    let mut config = base_config(temp.path());
    config.commands.part_a = "echo part_a exploded; exit 1".into();

    let sink = Arc::new(MemorySink::new());
    let mut run = make_run(config, sink.clone());
    let outcome = run.run().await;

    assert!(!outcome.succeeded());
    assert_eq!(outcome.failed_stage.as_deref(), Some("part_a"));
    assert!(outcome.final_report.is_none());

    // No Part B or later step events after the halt
    let steps = sink.step_indices();
    assert_eq!(steps, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn nonzero_exit_with_present_artifact_is_failure() {
    let temp = TempDir::new().unwrap();
    let mut config = base_config(temp.path());
    // A valid draft does not redeem a nonzero exit
    config.commands.part_a = format!(
        r#"printf 'draft body' > "{{output_dir}}/part_a/report_draft_{SLUG}_20240101-000000.md"; exit 1"#
    );

    let sink = Arc::new(MemorySink::new());
    let mut run = make_run(config, sink.clone());
    let outcome = run.run().await;

    assert!(!outcome.succeeded());
    assert_eq!(outcome.failed_stage.as_deref(), Some("part_a"));
    assert_eq!(sink.step_indices(), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn scenario_b2_clean_exit_without_artifact_is_failure() {
    let temp = TempDir::new().unwrap();
    let mut config = base_config(temp.path());
    // Exit code 0 but no draft written
    config.commands.part_a = "true".into();

    let sink = Arc::new(MemorySink::new());
    let mut run = make_run(config, sink.clone());
    let outcome = run.run().await;

    assert!(!outcome.succeeded());
    assert_eq!(outcome.failed_stage.as_deref(), Some("part_a"));
}

#[tokio::test]
async fn scenario_c_vector_upload_failure_is_soft() {
    let temp = TempDir::new().unwrap();
    let mut config = base_config(temp.path());
    config.commands.vector_upload = "echo upload exploded; exit 1".into();

    let sink = Arc::new(MemorySink::new());
    let mut run = make_run(config, sink.clone());
    let outcome = run.run().await;

    assert!(outcome.succeeded(), "outcome: {outcome:?}");
    assert!(outcome.vector_store_id.is_none());

    // All steps still ran
    assert_eq!(sink.step_indices(), (1..=TOTAL_STEPS).collect::<Vec<_>>());
}

#[tokio::test]
async fn scenario_d_part_b_recovers_after_transient_failures() {
    let temp = TempDir::new().unwrap();
    let mut config = base_config(temp.path());
    // First two attempts fail with the transient signature, third succeeds
    config.commands.part_b = concat!(
        r#"n=$(cat "$OUTPUT_DIR/attempts" 2>/dev/null || echo 0); "#,
        r#"n=$((n+1)); echo $n > "$OUTPUT_DIR/attempts"; "#,
        r#"if [ "$n" -lt 3 ]; then echo "Error code: 500 server_error"; exit 1; fi"#
    )
    .into();

    let sink = Arc::new(MemorySink::new());
    let mut run = make_run(config, sink.clone());
    let outcome = run.run().await;

    assert!(outcome.succeeded(), "outcome: {outcome:?}");

    let attempts = fs::read_to_string(temp.path().join(SLUG).join("attempts")).unwrap();
    assert_eq!(attempts.trim(), "3");
}

#[tokio::test]
async fn part_b_exhausts_retries_and_fails() {
    let temp = TempDir::new().unwrap();
    let mut config = base_config(temp.path());
    config.commands.part_b = concat!(
        r#"n=$(cat "$OUTPUT_DIR/attempts" 2>/dev/null || echo 0); "#,
        r#"n=$((n+1)); echo $n > "$OUTPUT_DIR/attempts"; "#,
        r#"echo "Error code: 500 server_error"; exit 1"#
    )
    .into();

    let sink = Arc::new(MemorySink::new());
    let mut run = make_run(config, sink.clone());
    let outcome = run.run().await;

    assert!(!outcome.succeeded());
    assert_eq!(outcome.failed_stage.as_deref(), Some("part_b"));

    // maxRetries = 2 means exactly 3 attempts
    let attempts = fs::read_to_string(temp.path().join(SLUG).join("attempts")).unwrap();
    assert_eq!(attempts.trim(), "3");

    // Run halted at step 6; no later step events
    assert_eq!(sink.step_indices(), vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn non_transient_part_b_failure_is_not_retried() {
    let temp = TempDir::new().unwrap();
    let mut config = base_config(temp.path());
    config.commands.part_b = concat!(
        r#"n=$(cat "$OUTPUT_DIR/attempts" 2>/dev/null || echo 0); "#,
        r#"n=$((n+1)); echo $n > "$OUTPUT_DIR/attempts"; "#,
        r#"echo "assertion failed"; exit 1"#
    )
    .into();

    let sink = Arc::new(MemorySink::new());
    let mut run = make_run(config, sink.clone());
    let outcome = run.run().await;

    assert!(!outcome.succeeded());

    let attempts = fs::read_to_string(temp.path().join(SLUG).join("attempts")).unwrap();
    assert_eq!(attempts.trim(), "1");
}

#[tokio::test]
async fn missing_final_artifact_fails_finalize() {
    let temp = TempDir::new().unwrap();
    let mut config = base_config(temp.path());
    // Consolidation exits cleanly but writes nothing
    config.commands.consolidation = "true".into();

    let sink = Arc::new(MemorySink::new());
    let mut run = make_run(config, sink.clone());
    let outcome = run.run().await;

    assert!(!outcome.succeeded());
    assert_eq!(outcome.failed_stage.as_deref(), Some("finalize"));
}

#[tokio::test]
async fn finalize_prefers_first_convention() {
    let temp = TempDir::new().unwrap();
    let mut config = base_config(temp.path());
    // Write both a fallback-convention and a first-convention report
    config.commands.consolidation = format!(
        r#"printf 'consolidated' > "{{output_dir}}/final/final_consolidated_report_{SLUG}_1.md"; printf 'dual model' > "{{output_dir}}/final/final_dual_model_report_{SLUG}_1.md""#
    );

    let sink = Arc::new(MemorySink::new());
    let mut run = make_run(config, sink.clone());
    let outcome = run.run().await;

    assert!(outcome.succeeded(), "outcome: {outcome:?}");
    let report = outcome.final_report.unwrap();
    assert_eq!(fs::read_to_string(report).unwrap(), "dual model");
}

#[tokio::test]
async fn stage_output_lines_are_forwarded() {
    let temp = TempDir::new().unwrap();
    let mut config = base_config(temp.path());
    config.commands.extraction = "echo extracting quotes".into();

    let sink = Arc::new(MemorySink::new());
    let mut run = make_run(config, sink.clone());
    let outcome = run.run().await;

    assert!(outcome.succeeded(), "outcome: {outcome:?}");
    assert!(sink
        .lines()
        .iter()
        .any(|line| line == "extracting quotes"));
}
