//! Progress event records.
//!
//! Events are immutable once built and forwarded verbatim to subscribers.
//! The wire shape is a flat JSON object tagged with `type`.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Discriminator for the event wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Progress,
    Error,
    Complete,
    Failed,
    Heartbeat,
}

/// A single progress update for a scan session.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Stage label, e.g. "ping", "quick_scan", "submit_task".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Completion percentage in 0..=100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Structured payload, e.g. normalized findings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// For error events: the stage that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_stage: Option<String>,
}

impl ProgressEvent {
    /// A progress update for a named stage.
    pub fn progress(stage: impl Into<String>, percent: u8, message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Progress,
            stage: Some(stage.into()),
            percent: Some(percent.min(100)),
            message: Some(message.into()),
            timestamp: Utc::now(),
            payload: None,
            error_stage: None,
        }
    }

    /// A non-terminal error event tagged with the failing stage.
    ///
    /// The session continues past these; a failure that ends the session
    /// is reported with [`ProgressEvent::failed`] instead.
    pub fn error(stage: impl Into<String>, message: impl Into<String>) -> Self {
        let stage = stage.into();
        Self {
            kind: EventKind::Error,
            stage: Some(stage.clone()),
            percent: None,
            message: Some(message.into()),
            timestamp: Utc::now(),
            payload: None,
            error_stage: Some(stage),
        }
    }

    /// The terminal success event for a session.
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Complete,
            stage: Some("complete".to_string()),
            percent: Some(100),
            message: Some(message.into()),
            timestamp: Utc::now(),
            payload: None,
            error_stage: None,
        }
    }

    /// The terminal failure event for a session.
    ///
    /// Ends the stream the same way `complete` does, so consumers never
    /// wait out their deadline on a session the worker already gave up on.
    pub fn failed(stage: impl Into<String>, message: impl Into<String>) -> Self {
        let stage = stage.into();
        Self {
            kind: EventKind::Failed,
            stage: Some(stage.clone()),
            percent: None,
            message: Some(message.into()),
            timestamp: Utc::now(),
            payload: None,
            error_stage: Some(stage),
        }
    }

    /// A synthetic keep-alive returned when a poll times out empty.
    pub fn heartbeat() -> Self {
        Self {
            kind: EventKind::Heartbeat,
            stage: None,
            percent: None,
            message: None,
            timestamp: Utc::now(),
            payload: None,
            error_stage: None,
        }
    }

    /// Attach a structured payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Whether this event ends the session's non-heartbeat stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::Complete | EventKind::Failed)
    }
}
