//! Remote scanning service client.
//!
//! Speaks the service's HTTP/JSON surface: `POST /api/tools/<name>` as
//! the primary invocation endpoint, then `POST /api/command` with an
//! ordered list of payload shapes when the primary endpoint rejects the
//! tool. The shape walk stops at the first 200. Connection-level failures
//! are reported as [`RemoteOutcome::Unreachable`] so the gateway can fall
//! back to local execution.

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{InvocationOrigin, ToolInvocationResult};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Payload shapes accepted by the `/api/command` endpoint, in the order
/// they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// `{"tool": <name>, "arguments": [...]}`
    Tool,
    /// `{"name": <name>, "arguments": [...]}`
    Name,
    /// `{"command": <name>, "arguments": [...]}`
    Command,
}

impl PayloadShape {
    /// Attempt order for the shape walk.
    pub const ORDER: [PayloadShape; 3] = [Self::Tool, Self::Name, Self::Command];

    /// The JSON key naming the tool in this shape.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Name => "name",
            Self::Command => "command",
        }
    }

    /// Wrap a tool invocation in this payload shape.
    pub fn wrap(&self, command: &str, args: &[String]) -> Value {
        json!({
            self.key(): command,
            "arguments": args,
        })
    }
}

/// Result of asking the remote service to run a tool.
#[derive(Debug)]
pub enum RemoteOutcome {
    /// The service executed the tool (successfully or not).
    Executed(ToolInvocationResult),
    /// The service responded but cannot execute this tool.
    Unsupported(String),
    /// The service could not be reached at all.
    Unreachable(String),
}

/// HTTP client for the remote scanning service.
pub struct RemoteClient {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Run `command` remotely, walking the payload-shape fallback chain.
    pub async fn invoke(
        &self,
        command: &str,
        args: &[String],
        timeout: Duration,
    ) -> RemoteOutcome {
        let url = format!("{}/api/tools/{}", self.base_url, command);
        let body = json!({ "arguments": args });

        let response = match self.client.post(&url).json(&body).timeout(timeout).send().await {
            Ok(r) => r,
            Err(e) => return RemoteOutcome::Unreachable(e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return RemoteOutcome::Executed(parse_execution_response(response).await);
        }

        if status.is_client_error() {
            debug!(%status, command, "tools endpoint rejected name, walking command shapes");
            return self.invoke_command_shapes(command, args, timeout).await;
        }

        RemoteOutcome::Unsupported(format!("tools endpoint returned {status}"))
    }

    /// Try `/api/command` with each payload shape, stopping at the first
    /// 200 response.
    async fn invoke_command_shapes(
        &self,
        command: &str,
        args: &[String],
        timeout: Duration,
    ) -> RemoteOutcome {
        let url = format!("{}/api/command", self.base_url);
        let mut last_status = None;

        for shape in PayloadShape::ORDER {
            let body = shape.wrap(command, args);
            let response = match self.client.post(&url).json(&body).timeout(timeout).send().await
            {
                Ok(r) => r,
                Err(e) => return RemoteOutcome::Unreachable(e.to_string()),
            };

            let status = response.status();
            if status.is_success() {
                debug!(shape = shape.key(), command, "command shape accepted");
                return RemoteOutcome::Executed(parse_execution_response(response).await);
            }

            debug!(shape = shape.key(), %status, "command shape rejected");
            last_status = Some(status);
        }

        RemoteOutcome::Unsupported(format!(
            "all command shapes rejected, last status {}",
            last_status.map(|s| s.to_string()).unwrap_or_default()
        ))
    }

    /// `POST /api/cache/clear`: drop cached output for prior targets.
    pub async fn clear_cache(&self) -> GatewayResult<()> {
        let url = format!("{}/api/cache/clear", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| GatewayError::Remote(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(GatewayError::Remote(format!(
                "cache clear returned {}",
                response.status()
            )))
        }
    }

    /// `GET /health`: service liveness check.
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(r) => r.status().is_success(),
            Err(_) => false,
        }
    }

    /// `POST /api/intelligence/analyze-target`: pre-scan intelligence.
    pub async fn analyze_target(
        &self,
        target: &str,
        analysis_type: &str,
    ) -> GatewayResult<Value> {
        let url = format!("{}/api/intelligence/analyze-target", self.base_url);
        let body = json!({ "target": target, "analysis_type": analysis_type });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| GatewayError::Remote(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::Remote(format!(
                "analyze-target returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Remote(e.to_string()))
    }
}

/// Decode an execution response body into a [`ToolInvocationResult`].
///
/// The service usually answers with `{success, stdout, stderr, error}`,
/// but some tool handlers return the raw output directly; a non-JSON body
/// is treated as stdout.
async fn parse_execution_response(response: reqwest::Response) -> ToolInvocationResult {
    let text = response.text().await.unwrap_or_default();

    if let Ok(value) = serde_json::from_str::<Value>(&text) {
        if value.is_object() {
            let stdout = value
                .get("stdout")
                .or_else(|| value.get("output"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return ToolInvocationResult {
                success: value.get("success").and_then(Value::as_bool).unwrap_or(true),
                stdout,
                stderr: value
                    .get("stderr")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                error: value
                    .get("error")
                    .and_then(Value::as_str)
                    .map(String::from),
                origin: InvocationOrigin::Remote,
            };
        }
    }

    ToolInvocationResult {
        success: true,
        stdout: text,
        stderr: String::new(),
        error: None,
        origin: InvocationOrigin::Remote,
    }
}
