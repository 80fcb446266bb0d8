//! Core type definitions.
//!
//! Validated targets, session lifecycle state, and the canonical finding
//! model produced by the result normalizer.

pub mod finding;
pub mod session;
pub mod target;

pub use finding::{
    classify_port_risk, PortFinding, PortState, Protocol, RiskTier, ServiceInfo, Severity,
    VulnerabilityFinding,
};
pub use session::{ScanSession, ScanStage, SessionId};
pub use target::ScanTarget;
