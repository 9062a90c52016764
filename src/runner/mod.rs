// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! Stage process runner
//!
//! Spawns one external stage command, merges its output streams into a
//! single ordered line stream, enforces a wall-clock timeout, and
//! always returns a [`StageResult`] — launch failures and timeouts are
//! encoded in the result, never raised. Every consumed line is
//! forwarded to the event sink as it is produced so progress is visible
//! in real time.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::events::EventSink;

/// Output marker for a stage killed on timeout
pub const TIMEOUT_SENTINEL: &str = "TIMEOUT";

/// Result of one stage attempt
#[derive(Debug, Clone)]
pub struct StageResult {
    /// Process exit code (1 for timeouts and launch failures)
    pub exit_code: i32,

    /// Combined stdout+stderr text, or a failure description
    pub output: String,

    /// Wall-clock time spent on this attempt
    pub elapsed: Duration,

    /// Attempt number, starting at 1
    pub attempt: u32,
}

impl StageResult {
    /// Whether the process exited cleanly
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Whether this attempt was killed on timeout
    pub fn timed_out(&self) -> bool {
        self.exit_code != 0 && self.output == TIMEOUT_SENTINEL
    }

    fn failure(output: String, elapsed: Duration, attempt: u32) -> Self {
        Self {
            exit_code: 1,
            output,
            elapsed,
            attempt,
        }
    }
}

/// Runs stage commands as child processes
pub struct ProcessRunner;

impl ProcessRunner {
    /// Execute a stage command and capture its combined output
    ///
    /// The command is run through `sh -c` so stage templates can use
    /// shell syntax. Stdout and stderr are consumed line-by-line as
    /// produced and forwarded verbatim to `sink`. If the process has
    /// not exited when `timeout` elapses it is killed and the result
    /// carries exit code 1 with [`TIMEOUT_SENTINEL`] as its output.
    pub async fn execute(
        command: &str,
        working_dir: &Path,
        env: &HashMap<String, String>,
        timeout: Duration,
        attempt: u32,
        sink: &dyn EventSink,
    ) -> StageResult {
        let start = Instant::now();

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return StageResult::failure(e.to_string(), start.elapsed(), attempt);
            }
        };

        let (tx, mut rx) = mpsc::channel::<String>(256);

        // stdout/stderr were just set to piped; take both readers
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut lines: Vec<String> = Vec::new();

        let waited = tokio::time::timeout(timeout, async {
            while let Some(line) = rx.recv().await {
                sink.line(&line);
                lines.push(line);
            }
            child.wait().await
        })
        .await;

        match waited {
            Ok(Ok(status)) => StageResult {
                exit_code: status.code().unwrap_or(-1),
                output: lines.join("\n"),
                elapsed: start.elapsed(),
                attempt,
            },
            Ok(Err(e)) => StageResult::failure(e.to_string(), start.elapsed(), attempt),
            Err(_) => {
                // Timed out; the wait future is gone, kill the child
                let _ = child.kill().await;
                StageResult::failure(TIMEOUT_SENTINEL.to_string(), start.elapsed(), attempt)
            }
        }
    }
}

/// Read lines from one stream and push them into the merged channel
async fn forward_lines<R: AsyncRead + Unpin>(reader: R, tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}
