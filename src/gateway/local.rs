//! Local subprocess fallback.
//!
//! Runs a tool as a local process when the remote service cannot, under
//! an independent timeout. A missing binary is a soft failure with a
//! distinct "not installed" message; the caller continues the session
//! either way.

use crate::error::GatewayError;
use crate::gateway::{InvocationOrigin, ToolInvocationResult};
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Executes tools as local subprocesses with captured output.
#[derive(Debug, Default)]
pub struct LocalRunner;

impl LocalRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run `command` with `args`, killing it if `budget` elapses.
    pub async fn run(
        &self,
        command: &str,
        args: &[String],
        budget: Duration,
    ) -> ToolInvocationResult {
        debug!(command, ?budget, "local invocation");

        let spawned = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let err = GatewayError::ToolUnavailable {
                    tool: command.to_string(),
                    reason: "not installed".to_string(),
                };
                return ToolInvocationResult::failure(InvocationOrigin::Local, err.to_string());
            }
            Err(e) => {
                let err = GatewayError::ToolUnavailable {
                    tool: command.to_string(),
                    reason: format!("spawn failed: {e}"),
                };
                return ToolInvocationResult::failure(InvocationOrigin::Local, err.to_string());
            }
        };

        // kill_on_drop reaps the child when the timeout branch drops it
        match timeout(budget, child.wait_with_output()).await {
            Ok(Ok(output)) => ToolInvocationResult {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                error: if output.status.success() {
                    None
                } else {
                    Some(format!("{command} exited with {}", output.status))
                },
                origin: InvocationOrigin::Local,
            },
            Ok(Err(e)) => ToolInvocationResult::failure(
                InvocationOrigin::Local,
                format!("failed to collect {command} output: {e}"),
            ),
            Err(_) => {
                let err = GatewayError::ToolTimeout {
                    tool: command.to_string(),
                    seconds: budget.as_secs(),
                };
                ToolInvocationResult::failure(InvocationOrigin::Local, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_reports_not_installed() {
        let runner = LocalRunner::new();
        let result = runner
            .run("scanflow-test-no-such-binary", &[], Duration::from_secs(1))
            .await;

        assert!(!result.success);
        assert_eq!(
            result.error.unwrap(),
            GatewayError::ToolUnavailable {
                tool: "scanflow-test-no-such-binary".to_string(),
                reason: "not installed".to_string(),
            }
            .to_string()
        );
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let runner = LocalRunner::new();
        let result = runner
            .run(
                "echo",
                &["22/tcp open ssh".to_string()],
                Duration::from_secs(5),
            )
            .await;

        assert!(result.success);
        assert_eq!(result.stdout.trim(), "22/tcp open ssh");
        assert_eq!(result.origin, InvocationOrigin::Local);
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let runner = LocalRunner::new();
        let result = runner
            .run("sleep", &["5".to_string()], Duration::from_millis(100))
            .await;

        assert!(!result.success);
        assert_eq!(
            result.error.unwrap(),
            GatewayError::ToolTimeout {
                tool: "sleep".to_string(),
                seconds: 0,
            }
            .to_string()
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_soft_failure() {
        let runner = LocalRunner::new();
        let result = runner
            .run("false", &[], Duration::from_secs(5))
            .await;

        assert!(!result.success);
        assert!(result.error.is_some());
    }
}
