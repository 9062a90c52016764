// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! Run configuration
//!
//! Defines the schema for reportflow.yaml files plus the built-in
//! defaults. Everything is overridable: stage command templates,
//! timeouts, the retry budget, the service readiness probe, and the
//! upload destination. Command templates use `{placeholder}` expansion
//! resolved against run state just before execution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ReportflowError, ReportflowResult};

/// Model selection passed through to stage programs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelSet {
    Cheap,
    Better,
    #[default]
    Gpt5,
}

impl std::fmt::Display for ModelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cheap => write!(f, "cheap"),
            Self::Better => write!(f, "better"),
            Self::Gpt5 => write!(f, "gpt5"),
        }
    }
}

/// Structured company attributes parsed from the free-text company info
///
/// The submission format is a sequence of `{Field name}: value` blocks
/// where a value runs until the next `{`-prefixed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyProfile {
    pub description: String,
    pub readiness_score: String,
    pub readiness_category: String,
    pub report_expectations: String,
}

impl Default for CompanyProfile {
    fn default() -> Self {
        Self {
            description: String::new(),
            readiness_score: "50".to_string(),
            readiness_category: "Explorer".to_string(),
            report_expectations: String::new(),
        }
    }
}

impl CompanyProfile {
    /// Parse the formatted company-info string; unknown fields are ignored
    pub fn parse(info: &str) -> Self {
        let mut profile = Self::default();
        if info.is_empty() {
            return profile;
        }

        let mut current: Option<(&str, Vec<&str>)> = None;

        let mut commit = |field: Option<(&str, Vec<&str>)>, profile: &mut Self| {
            let Some((name, lines)) = field else { return };
            let value = lines.join("\n").trim().to_string();
            if value.is_empty() {
                return;
            }
            match name {
                "Company description" => profile.description = value,
                "Overall Readiness score" => profile.readiness_score = value,
                "Agent-readiness category" => profile.readiness_category = value,
                "Report Expectations" => profile.report_expectations = value,
                _ => {}
            }
        };

        for line in info.lines() {
            if let Some(rest) = line.strip_prefix('{') {
                if let Some((name, value)) = rest.split_once("}:") {
                    commit(current.take(), &mut profile);
                    current = Some((name, vec![value.trim()]));
                    continue;
                }
            }
            if let Some((_, lines)) = current.as_mut() {
                lines.push(line);
            }
        }
        commit(current, &mut profile);

        profile
    }
}

/// Command templates for each pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageCommands {
    pub preprocess: String,
    pub vector_upload: String,
    pub service: String,
    pub extraction: String,
    pub part_a: String,
    pub part_b: String,
    pub use_cases: String,
    pub enhance: String,
    pub consolidation: String,
}

impl Default for StageCommands {
    fn default() -> Self {
        Self {
            preprocess: r#"python3 scripts/preprocess_data.py --company "{company}" --data-dir "{data_dir}""#.into(),
            vector_upload: r#"python3 helper_vectorstoreupload.py "{data_dir}""#.into(),
            service: "python3 minimal_mcp.py --port {port}".into(),
            extraction: r#"python3 pre-prep/step1.py --force --company-name "{company}""#.into(),
            part_a: "python3 part_a/minimal_dr_part_a.py".into(),
            part_b: "python3 part_b/minimal_dr_part_b.py".into(),
            use_cases: "python3 -u part_b/usecases_apicalls.py".into(),
            enhance: r#"python3 -u part_b/main2_refactored.py --input "{input}" --output "{output}""#.into(),
            consolidation: "python3 -u final_consolidation/main.py dual-model --content-model gpt-5 --style-model gpt-5-nano".into(),
        }
    }
}

/// Per-stage wall-clock timeouts in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub default_secs: u64,
    pub part_a_secs: u64,
    pub part_b_secs: u64,
    pub consolidation_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default_secs: 3600,
            part_a_secs: 7200,
            part_b_secs: 7200,
            consolidation_secs: 7200,
        }
    }
}

/// Retry budget and backoff for transient stage failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Extra attempts granted to Part B on transient failures
    pub part_b_max_retries: u32,
    /// Fixed delay between attempts, in seconds
    pub delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            part_b_max_retries: 2,
            delay_secs: 180,
        }
    }
}

/// Readiness probe for the background service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReadinessProbeConfig {
    /// Poll a TCP connect on the service port until it accepts
    Tcp { timeout_secs: u64 },
    /// Fixed grace period (legacy behavior of the cloud pipeline)
    Delay { secs: u64 },
}

impl Default for ReadinessProbeConfig {
    fn default() -> Self {
        Self::Delay { secs: 5 }
    }
}

/// Background service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub port: u16,
    pub readiness: ReadinessProbeConfig,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            port: 8001,
            readiness: ReadinessProbeConfig::default(),
        }
    }
}

/// Final report upload destination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Drive folder URL or bare folder id
    pub drive_folder: String,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            drive_folder: std::env::var("GDRIVE_FINAL_REPORT_FOLDER").unwrap_or_default(),
        }
    }
}

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Storage root; defaults to `/outputs` when present (cloud), else a
    /// local directory
    pub output_root: Option<PathBuf>,

    /// Working directory stage commands run in
    pub working_dir: Option<PathBuf>,

    pub model_set: ModelSet,
    pub use_cases_count: u32,

    pub commands: StageCommands,
    pub timeouts: Timeouts,
    pub retry: RetrySettings,
    pub service: ServiceSettings,
    pub upload: UploadSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_root: None,
            working_dir: None,
            model_set: ModelSet::default(),
            use_cases_count: default_use_cases(),
            commands: StageCommands::default(),
            timeouts: Timeouts::default(),
            retry: RetrySettings::default(),
            service: ServiceSettings::default(),
            upload: UploadSettings::default(),
        }
    }
}

impl RunConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> ReportflowResult<Self> {
        if !path.exists() {
            return Err(ReportflowError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| ReportflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> ReportflowResult<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        if config.use_cases_count == 0 {
            config.use_cases_count = default_use_cases();
        }
        Ok(config)
    }

    /// Effective storage root
    pub fn output_root(&self) -> PathBuf {
        if let Some(ref root) = self.output_root {
            return root.clone();
        }
        let cloud = PathBuf::from("/outputs");
        if cloud.is_dir() {
            cloud
        } else {
            PathBuf::from("reportflow_outputs")
        }
    }

    /// Effective working directory for stage commands
    pub fn working_dir(&self) -> PathBuf {
        self.working_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn default_use_cases() -> u32 {
    7
}

/// Expand `{placeholder}` markers in a command template
///
/// Unknown placeholders are an error so typos in configured templates
/// fail before the command is ever spawned. Expansion is a single pass
/// over the template; substituted values are never re-scanned, so a
/// value containing `{...}` text passes through literally.
pub fn interpolate(
    template: &str,
    vars: &HashMap<&'static str, String>,
) -> ReportflowResult<String> {
    // Unwrap is fine: the pattern is a compile-time constant
    let placeholder = regex::Regex::new(r"\{([a-z_]+)\}").unwrap();

    let mut rendered = String::with_capacity(template.len());
    let mut tail = 0;
    for caps in placeholder.captures_iter(template) {
        let marker = caps.get(0).unwrap();
        let key = &caps[1];
        let Some(value) = vars.get(key) else {
            return Err(ReportflowError::UnresolvedPlaceholder {
                placeholder: key.to_string(),
            });
        };
        rendered.push_str(&template[tail..marker.start()]);
        rendered.push_str(value);
        tail = marker.end();
    }
    rendered.push_str(&template[tail..]);

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.model_set, ModelSet::Gpt5);
        assert_eq!(config.timeouts.part_a_secs, 7200);
        assert_eq!(config.retry.part_b_max_retries, 2);
        assert_eq!(config.retry.delay_secs, 180);
        assert_eq!(config.service.port, 8001);
        assert_eq!(config.service.readiness, ReadinessProbeConfig::Delay { secs: 5 });
    }

    #[test]
    fn test_partial_yaml_overrides_defaults() {
        let yaml = r#"
model_set: cheap
use_cases_count: 3
retry:
  delay_secs: 1
commands:
  part_a: "run-part-a --fast"
service:
  port: 9000
  readiness:
    type: tcp
    timeout_secs: 10
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.model_set, ModelSet::Cheap);
        assert_eq!(config.use_cases_count, 3);
        assert_eq!(config.retry.delay_secs, 1);
        assert_eq!(config.retry.part_b_max_retries, 2);
        assert_eq!(config.commands.part_a, "run-part-a --fast");
        assert!(config.commands.part_b.contains("minimal_dr_part_b"));
        assert_eq!(config.service.port, 9000);
        assert_eq!(
            config.service.readiness,
            ReadinessProbeConfig::Tcp { timeout_secs: 10 }
        );
    }

    #[test]
    fn test_company_profile_defaults() {
        let profile = CompanyProfile::parse("");
        assert_eq!(profile.readiness_score, "50");
        assert_eq!(profile.readiness_category, "Explorer");
        assert!(profile.description.is_empty());
    }

    #[test]
    fn test_company_profile_parse_fields() {
        let info = "\
{Company description}: Makes widgets
for industrial clients
{Overall Readiness score}: 72
{Agent-readiness category}: Adopter
{Report Expectations}: Focus on automation";

        let profile = CompanyProfile::parse(info);
        assert_eq!(profile.description, "Makes widgets\nfor industrial clients");
        assert_eq!(profile.readiness_score, "72");
        assert_eq!(profile.readiness_category, "Adopter");
        assert_eq!(profile.report_expectations, "Focus on automation");
    }

    #[test]
    fn test_company_profile_ignores_unknown_fields() {
        let info = "{Mystery field}: whatever\n{Overall Readiness score}: 10";
        let profile = CompanyProfile::parse(info);
        assert_eq!(profile.readiness_score, "10");
        assert!(profile.description.is_empty());
    }

    #[test]
    fn test_interpolate() {
        let mut vars = HashMap::new();
        vars.insert("company", "Acme".to_string());
        vars.insert("port", "8001".to_string());

        let rendered = interpolate("run --name \"{company}\" --port {port}", &vars).unwrap();
        assert_eq!(rendered, "run --name \"Acme\" --port 8001");
    }

    #[test]
    fn test_interpolate_values_are_not_rescanned() {
        let mut vars = HashMap::new();
        vars.insert("company", "Acme {slug} Ltd".to_string());
        vars.insert("slug", "should_not_appear".to_string());

        let rendered = interpolate("run --name \"{company}\"", &vars).unwrap();
        assert_eq!(rendered, "run --name \"Acme {slug} Ltd\"");
    }

    #[test]
    fn test_interpolate_rejects_unknown_placeholder() {
        let vars = HashMap::new();
        let err = interpolate("run {mystery}", &vars).unwrap_err();
        assert!(matches!(
            err,
            ReportflowError::UnresolvedPlaceholder { ref placeholder } if placeholder == "mystery"
        ));
    }

    #[test]
    fn test_missing_config_file() {
        let err = RunConfig::from_file(Path::new("/nonexistent/reportflow.yaml")).unwrap_err();
        assert!(matches!(err, ReportflowError::ConfigNotFound { .. }));
    }
}
