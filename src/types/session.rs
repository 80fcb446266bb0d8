//! Scan session lifecycle.
//!
//! A session tracks one progressive scan against a single target. Stages
//! `Created` through `DeepScanSubmitted` are owned synchronously by the
//! orchestrator; `Running`/`Complete`/`Failed` advance inside the
//! background worker, under the same transition rules.

use crate::types::ScanTarget;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle stage of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStage {
    Created,
    Pinging,
    QuickScanning,
    DeepScanSubmitted,
    Running,
    Complete,
    Failed,
}

impl ScanStage {
    /// Whether the stage admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Whether `next` is a legal successor of this stage.
    ///
    /// `Failed` is reachable from any non-terminal stage; forward motion
    /// otherwise follows the pipeline order.
    pub fn can_advance_to(&self, next: ScanStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Failed {
            return true;
        }
        matches!(
            (self, next),
            (Self::Created, Self::Pinging)
                | (Self::Pinging, Self::QuickScanning)
                | (Self::QuickScanning, Self::DeepScanSubmitted)
                | (Self::DeepScanSubmitted, Self::Running)
                | (Self::Running, Self::Complete)
        )
    }
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Pinging => write!(f, "pinging"),
            Self::QuickScanning => write!(f, "quick_scanning"),
            Self::DeepScanSubmitted => write!(f, "deep_scan_submitted"),
            Self::Running => write!(f, "running"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One end-to-end progressive scan attempt against a single target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: SessionId,
    pub target: ScanTarget,
    /// Routing key for progress event delivery.
    pub channel: String,
    pub stage: ScanStage,
    pub started_at: DateTime<Utc>,
    /// Opaque handle to the background job; set once Stage 3 is submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_ref: Option<String>,
}

impl ScanSession {
    /// Create a fresh session in the `Created` stage.
    pub fn new(target: ScanTarget, channel: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            target,
            channel: channel.into(),
            stage: ScanStage::Created,
            started_at: Utc::now(),
            job_ref: None,
        }
    }

    /// Advance to `next` if the transition is legal.
    ///
    /// Returns `false` (leaving the session untouched) for illegal
    /// transitions, including any transition out of a terminal stage.
    pub fn advance(&mut self, next: ScanStage) -> bool {
        if self.stage.can_advance_to(next) {
            self.stage = next;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ScanSession {
        ScanSession::new(ScanTarget::parse("10.0.0.5").unwrap(), "chan-1")
    }

    #[test]
    fn test_pipeline_order() {
        let mut s = session();
        assert!(s.advance(ScanStage::Pinging));
        assert!(s.advance(ScanStage::QuickScanning));
        assert!(s.advance(ScanStage::DeepScanSubmitted));
        assert!(s.advance(ScanStage::Running));
        assert!(s.advance(ScanStage::Complete));
    }

    #[test]
    fn test_no_stage_skipping() {
        let mut s = session();
        assert!(!s.advance(ScanStage::QuickScanning));
        assert_eq!(s.stage, ScanStage::Created);
    }

    #[test]
    fn test_failed_reachable_from_any_live_stage() {
        let mut s = session();
        s.advance(ScanStage::Pinging);
        assert!(s.advance(ScanStage::Failed));
    }

    #[test]
    fn test_terminal_stages_are_frozen() {
        let mut s = session();
        s.advance(ScanStage::Failed);
        assert!(!s.advance(ScanStage::Pinging));
        assert!(!s.advance(ScanStage::Failed));
        assert_eq!(s.stage, ScanStage::Failed);
    }
}
