// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! Company-scoped artifact storage
//!
//! A deterministic directory tree per company slug, with append-only
//! artifact versioning: `save` always creates a new timestamped file
//! and never mutates or deletes an existing one. "Latest" resolution is
//! an indexed lookup against a per-kind manifest file, falling back to
//! the pointer copy and finally to a directory scan, so it stays
//! deterministic even when the convenience files are lost.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use regex::Regex;
use serde::Serialize;

use crate::errors::{ReportflowError, ReportflowResult};

/// Kinds of artifacts the orchestrator persists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Part A draft report
    PartADraft,
    /// Part B enhanced report
    PartBReport,
    /// Final consolidated report
    Final,
    /// Vector store id record
    VectorStoreId,
}

impl ArtifactKind {
    /// Filename prefix for this kind
    pub fn prefix(self) -> &'static str {
        match self {
            Self::PartADraft => "report_draft",
            Self::PartBReport => "report_enhanced",
            Self::Final => "FINAL_REPORT",
            Self::VectorStoreId => "vector",
        }
    }

    /// File extension for this kind
    pub fn ext(self) -> &'static str {
        match self {
            Self::PartADraft | Self::PartBReport | Self::Final => "md",
            Self::VectorStoreId => "json",
        }
    }

    /// Human-readable name used in errors and events
    pub fn name(self) -> &'static str {
        match self {
            Self::PartADraft => "part_a_draft",
            Self::PartBReport => "part_b_report",
            Self::Final => "final_report",
            Self::VectorStoreId => "vector_store_id",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Reference to a saved artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub path: PathBuf,
}

impl ArtifactRef {
    /// Artifact size in bytes (0 when unreadable)
    pub fn size(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the artifact exists and has content
    pub fn is_present_non_empty(&self) -> bool {
        self.path.exists() && self.size() > 0
    }

    /// Read the artifact content
    pub fn read(&self) -> ReportflowResult<String> {
        fs::read_to_string(&self.path).map_err(|e| ReportflowError::FileReadError {
            path: self.path.clone(),
            error: e.to_string(),
        })
    }
}

/// Storage statistics for one company tree
#[derive(Debug, Serialize)]
pub struct StorageStats {
    pub company: String,
    pub company_slug: String,
    pub total_size_bytes: u64,
    pub data_files: usize,
    pub part_a_drafts: usize,
    pub part_b_reports: usize,
    pub final_reports: usize,
}

/// Convert a company name to a filesystem-safe slug
pub fn slugify(name: &str) -> String {
    // Unwrap is fine: the pattern is a compile-time constant
    let re = Regex::new(r"[^A-Za-z0-9]+").unwrap();
    re.replace_all(name, "_")
        .trim_matches('_')
        .to_lowercase()
}

/// Company-scoped storage layout
///
/// Owned exclusively by one pipeline run at a time; the orchestrator
/// creates directories idempotently and never removes them.
pub struct StorageLayout {
    company_name: String,
    company_slug: String,
    root: PathBuf,
}

impl StorageLayout {
    /// Create a layout rooted at `root` for `company_name`
    pub fn new(root: impl Into<PathBuf>, company_name: &str) -> Self {
        Self {
            company_name: company_name.to_string(),
            company_slug: slugify(company_name),
            root: root.into(),
        }
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn company_slug(&self) -> &str {
        &self.company_slug
    }

    /// Root of this company's subtree
    pub fn company_root(&self) -> PathBuf {
        self.root.join(&self.company_slug)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.company_root().join("data")
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.company_root().join("debug")
    }

    pub fn part_a_dir(&self) -> PathBuf {
        self.company_root().join("part_a")
    }

    pub fn part_b_dir(&self) -> PathBuf {
        self.company_root().join("part_b")
    }

    pub fn final_dir(&self) -> PathBuf {
        self.company_root().join("final")
    }

    pub fn vector_ids_dir(&self) -> PathBuf {
        self.company_root().join("vector_ids")
    }

    /// Shared logs directory (not company-scoped)
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    fn kind_dir(&self, kind: ArtifactKind) -> PathBuf {
        match kind {
            ArtifactKind::PartADraft => self.part_a_dir(),
            ArtifactKind::PartBReport => self.part_b_dir(),
            ArtifactKind::Final => self.final_dir(),
            ArtifactKind::VectorStoreId => self.vector_ids_dir(),
        }
    }

    /// Create the directory tree; safe to call repeatedly
    pub fn ensure_dirs(&self) -> ReportflowResult<()> {
        for dir in [
            self.company_root(),
            self.data_dir(),
            self.debug_dir(),
            self.part_a_dir(),
            self.part_b_dir(),
            self.final_dir(),
            self.vector_ids_dir(),
            self.logs_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| ReportflowError::Storage {
                message: format!("Failed to create {}: {}", dir.display(), e),
            })?;
        }
        Ok(())
    }

    fn pointer_path(&self, kind: ArtifactKind) -> PathBuf {
        self.kind_dir(kind).join(format!(
            "{}_latest_{}.{}",
            kind.prefix(),
            self.company_slug,
            kind.ext()
        ))
    }

    fn manifest_path(&self, kind: ArtifactKind) -> PathBuf {
        self.kind_dir(kind)
            .join(format!("{}_manifest_{}.txt", kind.prefix(), self.company_slug))
    }

    /// Save a new artifact version; never overwrites an existing one
    ///
    /// Writes the timestamped file, appends it to the kind's manifest,
    /// refreshes the pointer copy, and for the final kind also writes a
    /// `.ready` signal file referencing the artifact path.
    pub fn save(&self, kind: ArtifactKind, content: &str) -> ReportflowResult<ArtifactRef> {
        let dir = self.kind_dir(kind);
        let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
        let base = format!("{}_{}_{}", kind.prefix(), self.company_slug, timestamp);

        // Same-second saves get a numeric suffix, which sorts above the
        // bare timestamp so name tie-breaking stays monotonic
        let mut path = dir.join(format!("{base}.{}", kind.ext()));
        let mut serial = 2u32;
        while path.exists() {
            path = dir.join(format!("{base}_{serial}.{}", kind.ext()));
            serial += 1;
        }

        fs::write(&path, content).map_err(|e| ReportflowError::FileWriteError {
            path: path.clone(),
            error: e.to_string(),
        })?;

        self.append_manifest(kind, &path)?;

        // Pointer is a copy rather than a symlink for portability
        let pointer = self.pointer_path(kind);
        fs::copy(&path, &pointer).map_err(|e| ReportflowError::FileWriteError {
            path: pointer,
            error: e.to_string(),
        })?;

        if kind == ArtifactKind::Final {
            let signal = path.with_extension("ready");
            fs::write(&signal, format!("{}\n", path.display())).map_err(|e| {
                ReportflowError::FileWriteError {
                    path: signal,
                    error: e.to_string(),
                }
            })?;
        }

        Ok(ArtifactRef { path })
    }

    fn append_manifest(&self, kind: ArtifactKind, artifact: &Path) -> ReportflowResult<()> {
        use std::io::Write;

        let manifest = self.manifest_path(kind);
        let name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&manifest)
            .map_err(|e| ReportflowError::FileWriteError {
                path: manifest.clone(),
                error: e.to_string(),
            })?;

        writeln!(file, "{name}").map_err(|e| ReportflowError::FileWriteError {
            path: manifest,
            error: e.to_string(),
        })
    }

    /// Resolve the newest artifact of a kind, if any
    ///
    /// Resolution order: manifest entries (newest first, skipping ones
    /// whose files are gone), then the pointer copy, then a directory
    /// scan by modification time with filename tie-break. Absent is a
    /// valid outcome the caller must handle.
    pub fn latest(&self, kind: ArtifactKind) -> Option<ArtifactRef> {
        let dir = self.kind_dir(kind);

        // 1. Indexed lookup
        if let Ok(manifest) = fs::read_to_string(self.manifest_path(kind)) {
            for name in manifest.lines().rev() {
                let candidate = dir.join(name.trim());
                if candidate.is_file() {
                    return Some(ArtifactRef { path: candidate });
                }
            }
        }

        // 2. Pointer copy
        let pointer = self.pointer_path(kind);
        if pointer.is_file() {
            return Some(ArtifactRef { path: pointer });
        }

        // 3. Directory scan
        self.scan_newest(kind)
    }

    fn scan_newest(&self, kind: ArtifactKind) -> Option<ArtifactRef> {
        let pattern = format!(
            "{}/{}_{}_*.{}",
            self.kind_dir(kind).display(),
            kind.prefix(),
            self.company_slug,
            kind.ext()
        );

        let mut candidates: Vec<PathBuf> = glob::glob(&pattern)
            .ok()?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();

        candidates.sort_by_key(|p| {
            let mtime = fs::metadata(p).and_then(|m| m.modified()).ok();
            (mtime, p.file_name().map(|n| n.to_os_string()))
        });

        candidates.pop().map(|path| ArtifactRef { path })
    }

    /// Persist a vector store id as a JSON record
    pub fn save_vector_store_id(&self, vector_store_id: &str) -> ReportflowResult<ArtifactRef> {
        let record = serde_json::json!({
            "vector_store_id": vector_store_id,
            "company_name": self.company_name,
            "company_slug": self.company_slug,
            "timestamp": Utc::now().format("%Y%m%d-%H%M%S").to_string(),
        });
        self.save(ArtifactKind::VectorStoreId, &serde_json::to_string_pretty(&record)?)
    }

    /// Most recently saved vector store id, if any
    pub fn latest_vector_store_id(&self) -> Option<String> {
        let record = self.latest(ArtifactKind::VectorStoreId)?;
        let content = record.read().ok()?;
        let value: serde_json::Value = serde_json::from_str(&content).ok()?;
        value
            .get("vector_store_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// List files in one of the named company directories
    pub fn list_files(&self, directory: &str) -> Vec<PathBuf> {
        let dir = match directory {
            "debug" => self.debug_dir(),
            "part_a" => self.part_a_dir(),
            "part_b" => self.part_b_dir(),
            "final" => self.final_dir(),
            "vector_ids" => self.vector_ids_dir(),
            _ => self.data_dir(),
        };

        match fs::read_dir(&dir) {
            Ok(entries) => {
                let mut files: Vec<PathBuf> =
                    entries.filter_map(Result::ok).map(|e| e.path()).collect();
                files.sort();
                files
            }
            Err(_) => Vec::new(),
        }
    }

    /// Storage statistics for this company tree
    pub fn stats(&self) -> StorageStats {
        let count = |dir: PathBuf, ext: Option<&str>| -> usize {
            fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .filter_map(Result::ok)
                        .map(|e| e.path())
                        .filter(|p| p.is_file())
                        .filter(|p| match ext {
                            Some(ext) => p.extension().and_then(|e| e.to_str()) == Some(ext),
                            None => true,
                        })
                        .count()
                })
                .unwrap_or(0)
        };

        StorageStats {
            company: self.company_name.clone(),
            company_slug: self.company_slug.clone(),
            total_size_bytes: dir_size(&self.company_root()),
            data_files: count(self.data_dir(), None),
            part_a_drafts: count(self.part_a_dir(), Some("md")),
            part_b_reports: count(self.part_b_dir(), Some("md")),
            final_reports: count(self.final_dir(), Some("md")),
        }
    }
}

/// Calculate directory size recursively
fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };

    let mut size = 0;
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if path.is_dir() {
            size += dir_size(&path);
        } else {
            size += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    size
}
