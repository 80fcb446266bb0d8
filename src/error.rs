//! Error types for scanflow.
//!
//! Uses `thiserror` for ergonomic error definitions. Each component owns
//! its error enum; the orchestrator-level taxonomy distinguishes fatal
//! failures (invalid target, job submission) from degradable ones
//! (unavailable or timed-out tools), which are absorbed into the progress
//! narrative rather than raised.

use thiserror::Error;

/// Errors surfaced by the scan orchestrator.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The target failed validation before any stage ran. Fatal.
    #[error("invalid scan target: {0}")]
    InvalidTarget(String),

    /// Deep-scan job submission failed. Fatal; the session ends Failed.
    #[error("deep scan submission failed: {0}")]
    Submission(String),

    /// Both deep-scan phases were unusable.
    #[error("deep scan produced no usable results for {target}")]
    DeepScanLost { target: String },
}

/// Errors surfaced by the scan tool gateway.
///
/// Tool-level failures degrade the session rather than abort it: the
/// gateway renders them into `success = false` invocation results so the
/// pipeline keeps moving. The remote management surfaces (cache clear,
/// target intelligence) return them directly.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The tool's binary could not be started.
    #[error("tool '{tool}' unavailable: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    /// The tool ran but exceeded its timeout budget.
    #[error("tool '{tool}' timed out after {seconds}s")]
    ToolTimeout { tool: String, seconds: u64 },

    #[error("remote service error: {0}")]
    Remote(String),
}

/// Per-record parse errors from the result normalizer.
///
/// These are swallowed at the batch level (the offending record is
/// skipped); they exist so skips can be logged with a reason.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed {
        path: std::path::PathBuf,
        reason: String,
    },

    #[error("invalid settings format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
