// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! Supervised background service
//!
//! Later pipeline stages depend on a long-lived helper service. The
//! orchestrator owns its process: it spawns the child, runs a readiness
//! probe before any dependent stage executes, and shuts the child down
//! on every exit path so the service never outlives the run.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::{Child, Command};

use crate::errors::{ReportflowError, ReportflowResult};

/// How to decide the service is ready for dependent stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessProbe {
    /// Poll a TCP connect on the given port until it accepts
    Tcp { port: u16, timeout: Duration },
    /// Fixed grace period with no verification
    Delay(Duration),
}

/// Handle to a supervised background service process
pub struct ServiceSupervisor {
    child: Child,
}

impl ServiceSupervisor {
    /// Spawn the service and wait for it to become ready
    ///
    /// Launch failure and a failed readiness probe are both hard errors:
    /// the stages that follow cannot run without this service.
    pub async fn start(
        command: &str,
        working_dir: &Path,
        env: &HashMap<String, String>,
        probe: ReadinessProbe,
    ) -> ReportflowResult<Self> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| ReportflowError::ServiceLaunchFailed {
            error: e.to_string(),
            help: Some("Check the service command template and PATH".into()),
        })?;

        let mut supervisor = Self { child };

        match probe {
            ReadinessProbe::Delay(grace) => {
                tokio::time::sleep(grace).await;
            }
            ReadinessProbe::Tcp { port, timeout } => {
                if !supervisor.poll_tcp(port, timeout).await {
                    supervisor.shutdown().await;
                    return Err(ReportflowError::ServiceNotReady {
                        waited_secs: timeout.as_secs(),
                    });
                }
            }
        }

        Ok(supervisor)
    }

    /// Poll a local TCP connect until it accepts or the window closes
    ///
    /// Also bails out early if the child exits, since a dead service
    /// will never accept.
    async fn poll_tcp(&mut self, port: u16, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        let addr = format!("127.0.0.1:{port}");

        loop {
            if TcpStream::connect(&addr).await.is_ok() {
                return true;
            }
            if matches!(self.child.try_wait(), Ok(Some(_))) {
                return false;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Whether the service process is still running
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Terminate the service process
    ///
    /// Safe to call even if the process already exited.
    pub async fn shutdown(&mut self) {
        let _ = self.child.kill().await;
        let _ = self.child.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[tokio::test]
    async fn test_start_with_delay_probe_and_shutdown() {
        let mut supervisor = ServiceSupervisor::start(
            "sleep 30",
            Path::new("."),
            &no_env(),
            ReadinessProbe::Delay(Duration::from_millis(50)),
        )
        .await
        .unwrap();

        assert!(supervisor.is_running());

        supervisor.shutdown().await;
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn test_tcp_probe_fails_for_silent_service() {
        let result = ServiceSupervisor::start(
            "sleep 30",
            Path::new("."),
            &no_env(),
            ReadinessProbe::Tcp {
                port: 1, // no listener will appear here
                timeout: Duration::from_millis(400),
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(ReportflowError::ServiceNotReady { .. })
        ));
    }

    #[tokio::test]
    async fn test_tcp_probe_bails_when_service_dies() {
        let start = std::time::Instant::now();
        let result = ServiceSupervisor::start(
            "exit 1",
            Path::new("."),
            &no_env(),
            ReadinessProbe::Tcp {
                port: 1,
                timeout: Duration::from_secs(30),
            },
        )
        .await;

        assert!(result.is_err());
        // Must not wait out the whole probe window once the child is dead
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_launch_failure_is_an_error() {
        let result = ServiceSupervisor::start(
            "echo hi",
            Path::new("/nonexistent/working/dir"),
            &no_env(),
            ReadinessProbe::Delay(Duration::ZERO),
        )
        .await;

        assert!(matches!(
            result,
            Err(ReportflowError::ServiceLaunchFailed { .. })
        ));
    }
}
