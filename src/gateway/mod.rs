//! Scan tool gateway.
//!
//! Abstracts "run this security tool somewhere" behind one retryable
//! interface. Invocation is remote-first against the scanning service,
//! walking an ordered list of payload shapes when the primary endpoint
//! rejects the tool, then falls back to a local subprocess when the
//! service is unreachable or cannot execute the tool. Both paths converge
//! on [`ToolInvocationResult`] so the normalizer never cares which one
//! produced the output.

pub mod local;
pub mod rate_limit;
pub mod remote;

pub use local::LocalRunner;
pub use rate_limit::InvocationLimiter;
pub use remote::{PayloadShape, RemoteClient, RemoteOutcome};

use crate::error::GatewayResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

/// Which execution path produced an invocation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationOrigin {
    Remote,
    Local,
}

/// Outcome of one attempted tool invocation.
///
/// Produced for every attempt, success or not; consumed by the result
/// normalizer and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocationResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub origin: InvocationOrigin,
}

impl ToolInvocationResult {
    /// A failed invocation with no captured output.
    pub fn failure(origin: InvocationOrigin, error: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error.into()),
            origin,
        }
    }

    /// Whether the output is worth handing to the normalizer.
    pub fn is_usable(&self) -> bool {
        self.success && !self.stdout.trim().is_empty()
    }
}

/// Translation from logical tool identifiers to executable command names.
///
/// The remote service executes tool names as literal commands, so the
/// logical identifier must be translated before it goes over the wire.
static TOOL_COMMANDS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut m = HashMap::new();
    m.insert("port_scan", "nmap");
    m.insert("vuln_scan", "nuclei");
    m.insert("liveness", "ping");
    m
});

/// Translate a logical tool identifier to its command name.
///
/// Names without a translation entry pass through unchanged, so callers
/// may also use command names directly.
pub fn translate_tool_name(logical: &str) -> &str {
    TOOL_COMMANDS.get(logical).copied().unwrap_or(logical)
}

/// The gateway contract consumed by the orchestrator and worker paths.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// Run a tool with the given arguments under a timeout budget.
    ///
    /// Never errors for tool-level failures: a missing tool, a timeout,
    /// or a non-zero exit all come back as `success = false` results so
    /// the session can continue.
    async fn invoke(&self, tool: &str, args: &[String], timeout: Duration)
        -> ToolInvocationResult;

    /// Ask the remote service to drop cached output for prior targets.
    async fn clear_cache(&self) -> GatewayResult<()>;

    /// Probe the remote service's health endpoint.
    async fn health(&self) -> bool;

    /// Request target intelligence from the remote service.
    async fn analyze_target(
        &self,
        target: &str,
        analysis_type: &str,
    ) -> GatewayResult<serde_json::Value>;
}

/// Production gateway: remote scanning service with local-binary fallback.
pub struct ScanToolGateway {
    remote: Option<RemoteClient>,
    local: LocalRunner,
    limiter: InvocationLimiter,
}

impl ScanToolGateway {
    /// Gateway backed by a remote service at `base_url`, with fallback.
    pub fn new(base_url: impl Into<String>, invocations_per_second: u32) -> Self {
        Self {
            remote: Some(RemoteClient::new(base_url)),
            local: LocalRunner::new(),
            limiter: InvocationLimiter::new(invocations_per_second),
        }
    }

    /// Gateway with no remote service configured; local execution only.
    pub fn local_only(invocations_per_second: u32) -> Self {
        Self {
            remote: None,
            local: LocalRunner::new(),
            limiter: InvocationLimiter::new(invocations_per_second),
        }
    }
}

#[async_trait]
impl ToolGateway for ScanToolGateway {
    async fn invoke(
        &self,
        tool: &str,
        args: &[String],
        timeout: Duration,
    ) -> ToolInvocationResult {
        let command = translate_tool_name(tool);
        self.limiter.wait().await;

        if let Some(remote) = &self.remote {
            match remote.invoke(command, args, timeout).await {
                RemoteOutcome::Executed(result) => {
                    debug!(tool = command, success = result.success, "remote invocation");
                    return result;
                }
                RemoteOutcome::Unsupported(reason) => {
                    debug!(tool = command, reason, "remote cannot execute tool, trying local");
                }
                RemoteOutcome::Unreachable(reason) => {
                    warn!(tool = command, reason, "remote service unreachable, trying local");
                }
            }
        }

        self.local.run(command, args, timeout).await
    }

    async fn clear_cache(&self) -> GatewayResult<()> {
        match &self.remote {
            Some(remote) => remote.clear_cache().await,
            None => Ok(()),
        }
    }

    async fn health(&self) -> bool {
        match &self.remote {
            Some(remote) => remote.health().await,
            None => false,
        }
    }

    async fn analyze_target(
        &self,
        target: &str,
        analysis_type: &str,
    ) -> GatewayResult<serde_json::Value> {
        match &self.remote {
            Some(remote) => remote.analyze_target(target, analysis_type).await,
            None => Ok(serde_json::Value::Null),
        }
    }
}
