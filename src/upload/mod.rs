// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! Final report upload boundary
//!
//! Upload is best-effort: a failed upload is logged and never fails the
//! run. The orchestrator consumes this interface only; wiring a real
//! Drive client in belongs to the deployment, not to the core.

use std::path::Path;

use async_trait::async_trait;
use regex::Regex;

/// Best-effort uploader for the final report
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload `local_path` into the destination folder
    ///
    /// Returns whether the upload succeeded. Must not panic or block
    /// the pipeline beyond a reasonable transfer time.
    async fn upload(&self, local_path: &Path, folder_id: &str) -> bool;
}

/// Uploader used when no client is configured
///
/// Mirrors the "Google API not available" path of the original cloud
/// pipeline: warn and carry on.
pub struct DisabledUploader;

#[async_trait]
impl Uploader for DisabledUploader {
    async fn upload(&self, local_path: &Path, _folder_id: &str) -> bool {
        tracing::warn!(
            "No upload client configured; skipping upload of {}",
            local_path.display()
        );
        false
    }
}

/// Extract a Drive folder id from a folder URL
///
/// Bare ids pass through unchanged so configuration may hold either
/// form.
pub fn extract_folder_id(folder: &str) -> String {
    // Unwrap is fine: the pattern is a compile-time constant
    let re = Regex::new(r"/folders/([a-zA-Z0-9_-]+)").unwrap();
    match re.captures(folder) {
        Some(caps) => caps[1].to_string(),
        None => folder.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_folder_id_from_url() {
        let url = "https://drive.google.com/drive/folders/17mklV-Pz7Jqv1ZQiDNvYOvNA6qXzROXF";
        assert_eq!(extract_folder_id(url), "17mklV-Pz7Jqv1ZQiDNvYOvNA6qXzROXF");
    }

    #[test]
    fn test_bare_id_passes_through() {
        assert_eq!(extract_folder_id("abc_DEF-123"), "abc_DEF-123");
    }

    #[tokio::test]
    async fn test_disabled_uploader_returns_false() {
        let uploader = DisabledUploader;
        assert!(!uploader.upload(Path::new("/tmp/report.md"), "folder").await);
    }
}
