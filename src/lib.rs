//! # Scanflow - Progressive Scan Orchestrator
//!
//! Scanflow coordinates security scans against a network target across
//! multiple execution stages with different latency profiles, streaming
//! progress to observers in real time while tolerating the unreliability
//! of external scanning tools and services.
//!
//! ## Pipeline
//!
//! A session runs liveness check and fast port enumeration synchronously,
//! then hands a deep-scan job descriptor to an external queue and returns.
//! The worker runs full-detail enumeration and a vulnerability template
//! scan through the same gateway, publishing further events on the
//! session's channel and terminating with a `complete` or `error` event.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use scanflow::config::ScanSettings;
//! use scanflow::bus::EventBus;
//! use scanflow::gateway::ScanToolGateway;
//! use scanflow::orchestrator::ScanOrchestrator;
//! use scanflow::registry::SessionRegistry;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = ScanSettings::default();
//!     let gateway = Arc::new(ScanToolGateway::local_only(settings.gateway_rate_limit));
//!     let orchestrator = ScanOrchestrator::new(
//!         gateway,
//!         my_job_queue(),
//!         EventBus::new(),
//!         SessionRegistry::new(),
//!         settings,
//!     );
//!
//!     let summary = orchestrator.start_session("scanme.example.com", "chan-1").await.unwrap();
//!     println!("{} open ports, job {}", summary.open_ports.len(), summary.job_id);
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`types`] - Core type definitions: targets, sessions, findings
//! - [`normalizer`] - Raw tool output to canonical findings
//! - [`gateway`] - Remote scanning service with local-binary fallback
//! - [`bus`] - Keyed progress event pub/sub with heartbeats
//! - [`orchestrator`] - The stage state machine
//! - [`jobs`] - Background job handoff interface
//! - [`registry`] - Active session registry
//! - [`config`] - Settings and paths
//! - [`error`] - Error taxonomy

pub mod bus;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod jobs;
pub mod normalizer;
pub mod orchestrator;
pub mod registry;
pub mod types;

// Re-export commonly used types
pub use bus::{EventBus, ProgressEvent};
pub use error::{GatewayError, OrchestratorError, ParseError};
pub use gateway::{ScanToolGateway, ToolGateway, ToolInvocationResult};
pub use jobs::{JobDescriptor, JobId, JobQueue};
pub use orchestrator::{DeepScanReport, QuickScanSummary, ScanOrchestrator};
pub use registry::SessionRegistry;
pub use types::{PortFinding, ScanSession, ScanStage, ScanTarget, Severity, VulnerabilityFinding};
