//! Progressive scan orchestrator.
//!
//! Sequences the three stages of a session: liveness check, fast port
//! enumeration, and deep-scan handoff. Stages 1 and 2 run on the caller's
//! task under explicit timeouts; Stage 3 is a job descriptor handed to an
//! external queue, whose worker drives [`ScanOrchestrator::run_deep_scan`]
//! with the same transition rules.
//!
//! Failure policy: liveness and fast-scan failures degrade the session
//! (a differently worded progress event) instead of aborting it, since
//! many hosts drop ICMP while still serving. Only an invalid target, a
//! failed job submission, or a deep scan with both phases unusable marks
//! a session `Failed`.

use crate::bus::{EventBus, ProgressEvent};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::gateway::ToolGateway;
use crate::jobs::{JobDescriptor, JobId, JobQueue};
use crate::normalizer::{self, xml::HostDetails};
use crate::registry::SessionRegistry;
use crate::config::ScanSettings;
use crate::types::{PortFinding, ScanStage, ScanTarget, SessionId, VulnerabilityFinding};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// What the synchronous caller gets back from [`ScanOrchestrator::start_session`].
#[derive(Debug, Clone, Serialize)]
pub struct QuickScanSummary {
    pub session_id: SessionId,
    pub target: ScanTarget,
    pub channel: String,
    /// Whether the liveness check got a response.
    pub host_alive: bool,
    /// Open ports found by the fast enumeration.
    pub open_ports: Vec<PortFinding>,
    /// Reference to the submitted deep-scan job.
    pub job_id: JobId,
    /// Stage labels that ran, in order.
    pub stages_completed: Vec<String>,
}

/// Normalized output of the deep-scan worker path.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeepScanReport {
    pub ports: Vec<PortFinding>,
    pub host: HostDetails,
    pub vulnerabilities: Vec<VulnerabilityFinding>,
}

/// Coordinates scan sessions across the gateway, event bus, and job queue.
pub struct ScanOrchestrator {
    gateway: Arc<dyn ToolGateway>,
    jobs: Arc<dyn JobQueue>,
    bus: EventBus,
    registry: SessionRegistry,
    settings: ScanSettings,
}

impl ScanOrchestrator {
    pub fn new(
        gateway: Arc<dyn ToolGateway>,
        jobs: Arc<dyn JobQueue>,
        bus: EventBus,
        registry: SessionRegistry,
        settings: ScanSettings,
    ) -> Self {
        Self {
            gateway,
            jobs,
            bus,
            registry,
            settings,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Run Stages 1–2 synchronously and hand Stage 3 to the job queue.
    ///
    /// Always returns within the ping + quick-scan timeout budget. The
    /// only fatal outcomes are an invalid target and a failed submission.
    pub async fn start_session(
        &self,
        target: &str,
        channel: &str,
    ) -> OrchestratorResult<QuickScanSummary> {
        let target = ScanTarget::parse(target)?;
        let session = self.registry.create(target.clone(), channel);
        let mut stages_completed = Vec::new();

        info!(id = %session.id, %target, channel, "starting scan session");

        // Stage 1: liveness
        self.registry.advance(session.id, ScanStage::Pinging);
        let host_alive = self.check_liveness(&target).await;
        let message = if host_alive {
            format!("host {target} alive")
        } else {
            format!("no response from {target}, continuing")
        };
        self.bus.publish(channel, ProgressEvent::progress("ping", 10, message));
        stages_completed.push("ping".to_string());

        // Stage 2: fast enumeration, never fatal
        self.registry.advance(session.id, ScanStage::QuickScanning);
        self.bus.publish(
            channel,
            ProgressEvent::progress(
                "quick_scan",
                30,
                format!("fast enumeration of top {} ports", self.settings.quick_scan_top_ports),
            ),
        );

        let open_ports = self.quick_scan(&target).await;
        self.bus.publish(
            channel,
            ProgressEvent::progress(
                "quick_scan",
                60,
                format!("fast scan finished: {} open ports", open_ports.len()),
            )
            .with_payload(json!({ "open_ports": open_ports })),
        );
        stages_completed.push("quick_scan".to_string());

        // Stage 3: deep-scan handoff
        self.bus.publish(
            channel,
            ProgressEvent::progress("submit_task", 70, "submitting deep scan"),
        );

        let descriptor = JobDescriptor {
            session_id: session.id,
            target: target.clone(),
            channel: channel.to_string(),
        };

        // The stage moves before submission: an inline queue may start the
        // worker (which advances to Running) before submit returns.
        self.registry.advance(session.id, ScanStage::DeepScanSubmitted);
        let job_id = match self.jobs.submit(descriptor).await {
            Ok(id) => id,
            Err(e) => {
                self.bus
                    .publish(channel, ProgressEvent::failed("submit_task", e.to_string()));
                self.registry.advance(session.id, ScanStage::Failed);
                self.registry.remove(session.id);
                return Err(OrchestratorError::Submission(e.to_string()));
            }
        };

        self.registry.set_job_ref(session.id, job_id.to_string());
        self.bus.publish(
            channel,
            ProgressEvent::progress(
                "task_submitted",
                100,
                format!("deep scan submitted: {job_id}"),
            ),
        );
        stages_completed.push("submit_task".to_string());

        Ok(QuickScanSummary {
            session_id: session.id,
            target,
            channel: channel.to_string(),
            host_alive,
            open_ports,
            job_id,
            stages_completed,
        })
    }

    /// Liveness check with a bounded timeout. Failure is signal quality,
    /// not an abort.
    async fn check_liveness(&self, target: &ScanTarget) -> bool {
        let wait_secs = self.settings.ping_timeout_secs.max(1);
        let args = vec![
            "-c".to_string(),
            "1".to_string(),
            "-W".to_string(),
            wait_secs.to_string(),
            target.to_string(),
        ];

        // Grace second on top of the tool's own wait
        let budget = self.settings.ping_timeout() + Duration::from_secs(1);
        let result = self.gateway.invoke("liveness", &args, budget).await;
        result.success
    }

    /// Fast enumeration: top-N ports, aggressive timing, minimal version
    /// probing, hard 60s budget. Timeout or missing tool yields an empty
    /// port list.
    async fn quick_scan(&self, target: &ScanTarget) -> Vec<PortFinding> {
        let args = vec![
            "--top-ports".to_string(),
            self.settings.quick_scan_top_ports.to_string(),
            "-T4".to_string(),
            "-sV".to_string(),
            "--version-intensity".to_string(),
            "0".to_string(),
            target.to_string(),
        ];

        let result = self
            .gateway
            .invoke("port_scan", &args, self.settings.quick_scan_timeout())
            .await;

        if !result.is_usable() {
            warn!(
                %target,
                error = result.error.as_deref().unwrap_or("no output"),
                "fast scan unusable, continuing with empty port list"
            );
            return Vec::new();
        }

        normalizer::parse_ports(&result.stdout)
            .into_iter()
            .filter(|f| f.state.is_open())
            .collect()
    }

    /// Deep-scan execution, driven by the background worker.
    ///
    /// Runs full-detail enumeration then the vulnerability template scan.
    /// A phase failure publishes an `error` event and the pipeline moves
    /// on; the session only fails when neither phase produced usable
    /// output.
    pub async fn run_deep_scan(
        &self,
        descriptor: &JobDescriptor,
    ) -> OrchestratorResult<DeepScanReport> {
        let target = &descriptor.target;
        let channel = descriptor.channel.as_str();
        let started = Instant::now();
        let budget = self.settings.deep_scan_budget();

        info!(%target, channel, "deep scan worker started");

        // Stale cached output for a previously-scanned target would
        // defeat the rescan; failure here is logged and non-fatal.
        if let Err(e) = self.gateway.clear_cache().await {
            warn!(error = %e, "cache clear failed before deep scan");
        }

        self.bus.publish(
            channel,
            ProgressEvent::progress("deep_scan", 75, format!("deep enumeration of {target}")),
        );

        // Phase 1: full-detail enumeration
        let enum_args = vec![
            "-sV".to_string(),
            "-O".to_string(),
            "-T4".to_string(),
            "-oX".to_string(),
            "-".to_string(),
            target.to_string(),
        ];
        let enum_result = self.gateway.invoke("port_scan", &enum_args, budget).await;
        let enum_usable = enum_result.is_usable();

        if enum_usable {
            self.bus.publish(
                channel,
                ProgressEvent::progress("deep_scan_done", 85, "deep enumeration finished")
                    .with_payload(json!(enum_result)),
            );
        } else {
            self.bus.publish(
                channel,
                ProgressEvent::error(
                    "deep_scan",
                    enum_result
                        .error
                        .clone()
                        .unwrap_or_else(|| "deep enumeration produced no output".to_string()),
                ),
            );
        }

        // Phase 2: vulnerability templates, bounded rate and concurrency
        let remaining = budget
            .saturating_sub(started.elapsed())
            .max(Duration::from_secs(1));
        let vuln_args = vec![
            "-u".to_string(),
            target.to_string(),
            "-severity".to_string(),
            "medium,high,critical".to_string(),
            "-rate-limit".to_string(),
            self.settings.vuln_rate_limit.to_string(),
            "-c".to_string(),
            self.settings.vuln_concurrency.to_string(),
            "-timeout".to_string(),
            self.settings.vuln_request_timeout_secs.to_string(),
            "-retries".to_string(),
            self.settings.vuln_retries.to_string(),
            "-jsonl".to_string(),
        ];
        let vuln_result = self.gateway.invoke("vuln_scan", &vuln_args, remaining).await;
        let vuln_usable = vuln_result.success;

        if vuln_usable {
            self.bus.publish(
                channel,
                ProgressEvent::progress("vuln_scan_done", 95, "vulnerability scan finished")
                    .with_payload(json!(vuln_result)),
            );
        } else {
            self.bus.publish(
                channel,
                ProgressEvent::error(
                    "vuln_scan",
                    vuln_result
                        .error
                        .clone()
                        .unwrap_or_else(|| "vulnerability scan failed".to_string()),
                ),
            );
        }

        if !enum_usable && !vuln_usable {
            return Err(OrchestratorError::DeepScanLost {
                target: target.to_string(),
            });
        }

        // Partial results are better than none
        let report = DeepScanReport {
            ports: if enum_usable {
                normalizer::parse_ports(&enum_result.stdout)
            } else {
                Vec::new()
            },
            host: if enum_usable {
                normalizer::xml::parse_host_details(&enum_result.stdout)
            } else {
                HostDetails::default()
            },
            vulnerabilities: if vuln_usable {
                normalizer::parse_vulnerabilities(&vuln_result.stdout)
            } else {
                Vec::new()
            },
        };

        self.bus.publish(
            channel,
            ProgressEvent::complete(format!(
                "scan of {target} complete: {} ports, {} findings",
                report.ports.len(),
                report.vulnerabilities.len()
            ))
            .with_payload(json!({
                "ports": report.ports,
                "host": report.host,
                "vulnerabilities": report.vulnerabilities,
            })),
        );

        Ok(report)
    }

    /// Drive a submitted job to its terminal event, marking the session
    /// stages the worker owns (`Running`, then `Complete` or `Failed`)
    /// and retiring the session from the registry.
    ///
    /// This is the body an in-process worker runs; an external worker
    /// implements the same sequence against its own orchestrator
    /// instance.
    pub async fn execute_job(&self, descriptor: JobDescriptor) {
        self.registry.advance(descriptor.session_id, ScanStage::Running);

        match self.run_deep_scan(&descriptor).await {
            Ok(report) => {
                info!(
                    target = %descriptor.target,
                    ports = report.ports.len(),
                    vulnerabilities = report.vulnerabilities.len(),
                    "deep scan complete"
                );
                self.registry.advance(descriptor.session_id, ScanStage::Complete);
            }
            Err(e) => {
                warn!(target = %descriptor.target, error = %e, "deep scan failed");
                self.registry.advance(descriptor.session_id, ScanStage::Failed);
                self.bus.publish(
                    descriptor.channel.as_str(),
                    ProgressEvent::failed("deep_scan", e.to_string()),
                );
            }
        }

        self.registry.remove(descriptor.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayResult;
    use crate::gateway::{InvocationOrigin, ToolInvocationResult};
    use crate::jobs::SubmissionError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Gateway returning scripted results per logical tool name.
    struct ScriptedGateway {
        results: HashMap<String, ToolInvocationResult>,
        invoked: Mutex<Vec<String>>,
    }

    impl ScriptedGateway {
        fn new() -> Self {
            Self {
                results: HashMap::new(),
                invoked: Mutex::new(Vec::new()),
            }
        }

        fn with_success(mut self, tool: &str, stdout: &str) -> Self {
            self.results.insert(
                tool.to_string(),
                ToolInvocationResult {
                    success: true,
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                    error: None,
                    origin: InvocationOrigin::Local,
                },
            );
            self
        }

        fn with_failure(mut self, tool: &str, error: &str) -> Self {
            self.results
                .insert(tool.to_string(), ToolInvocationResult::failure(InvocationOrigin::Local, error));
            self
        }
    }

    #[async_trait]
    impl ToolGateway for ScriptedGateway {
        async fn invoke(
            &self,
            tool: &str,
            _args: &[String],
            _timeout: Duration,
        ) -> ToolInvocationResult {
            self.invoked.lock().unwrap().push(tool.to_string());
            self.results
                .get(tool)
                .cloned()
                .unwrap_or_else(|| ToolInvocationResult::failure(InvocationOrigin::Local, "unscripted"))
        }

        async fn clear_cache(&self) -> GatewayResult<()> {
            Ok(())
        }

        async fn health(&self) -> bool {
            true
        }

        async fn analyze_target(
            &self,
            _target: &str,
            _analysis_type: &str,
        ) -> GatewayResult<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
    }

    struct AcceptingQueue;

    #[async_trait]
    impl JobQueue for AcceptingQueue {
        async fn submit(&self, _descriptor: JobDescriptor) -> Result<JobId, SubmissionError> {
            Ok(JobId::new())
        }
    }

    struct RejectingQueue;

    #[async_trait]
    impl JobQueue for RejectingQueue {
        async fn submit(&self, _descriptor: JobDescriptor) -> Result<JobId, SubmissionError> {
            Err(SubmissionError("queue full".to_string()))
        }
    }

    fn orchestrator(
        gateway: ScriptedGateway,
        jobs: Arc<dyn JobQueue>,
    ) -> ScanOrchestrator {
        ScanOrchestrator::new(
            Arc::new(gateway),
            jobs,
            EventBus::new(),
            SessionRegistry::new(),
            ScanSettings::default(),
        )
    }

    async fn drain_events(bus: &EventBus, channel: &str) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        loop {
            let event = bus.next_event(channel, Duration::from_millis(20)).await;
            if matches!(event.kind, crate::bus::EventKind::Heartbeat) {
                return events;
            }
            events.push(event);
        }
    }

    #[tokio::test]
    async fn test_invalid_target_fails_before_any_stage() {
        let orch = orchestrator(ScriptedGateway::new(), Arc::new(AcceptingQueue));
        let result = orch.start_session("", "c1").await;
        assert!(matches!(result, Err(OrchestratorError::InvalidTarget(_))));
        assert!(orch.registry().is_empty());
    }

    #[tokio::test]
    async fn test_full_synchronous_path() {
        let gateway = ScriptedGateway::new()
            .with_success("liveness", "1 packets transmitted, 1 received")
            .with_success("port_scan", "22/tcp open ssh\n80/tcp open http\n443/tcp closed https");
        let orch = orchestrator(gateway, Arc::new(AcceptingQueue));

        let summary = orch.start_session("10.0.0.9", "c1").await.unwrap();
        assert!(summary.host_alive);
        // Closed port filtered out of the summary
        assert_eq!(summary.open_ports.len(), 2);
        assert_eq!(
            summary.stages_completed,
            vec!["ping", "quick_scan", "submit_task"]
        );

        let session = orch.registry().lookup(summary.session_id).unwrap();
        assert_eq!(session.stage, ScanStage::DeepScanSubmitted);
        assert_eq!(session.job_ref, Some(summary.job_id.to_string()));

        let events = drain_events(orch.bus(), "c1").await;
        let stages: Vec<_> = events.iter().filter_map(|e| e.stage.clone()).collect();
        assert_eq!(
            stages,
            vec!["ping", "quick_scan", "quick_scan", "submit_task", "task_submitted"]
        );
        assert_eq!(events.last().unwrap().percent, Some(100));
    }

    #[tokio::test]
    async fn test_start_session_returns_within_stage_budget() {
        // Liveness and quick scan both fail; the session must still
        // return promptly rather than exhausting the full timeouts.
        let gateway = ScriptedGateway::new()
            .with_failure("liveness", "no response")
            .with_failure("port_scan", "unusable");
        let orch = orchestrator(gateway, Arc::new(AcceptingQueue));

        let started = Instant::now();
        let summary = orch.start_session("10.0.0.9", "c1").await.unwrap();
        let budget = orch.settings.ping_timeout()
            + orch.settings.quick_scan_timeout()
            + Duration::from_secs(5);
        assert!(started.elapsed() < budget);
        assert_eq!(
            summary.stages_completed,
            vec!["ping", "quick_scan", "submit_task"]
        );
    }

    #[tokio::test]
    async fn test_ping_failure_never_prevents_quick_scan() {
        let gateway = ScriptedGateway::new()
            .with_failure("liveness", "no response")
            .with_success("port_scan", "22/tcp open ssh");
        let orch = orchestrator(gateway, Arc::new(AcceptingQueue));

        let summary = orch.start_session("10.0.0.9", "c1").await.unwrap();
        assert!(!summary.host_alive);
        assert!(summary.stages_completed.contains(&"quick_scan".to_string()));
        assert_eq!(summary.open_ports.len(), 1);

        let events = drain_events(orch.bus(), "c1").await;
        assert!(events[0]
            .message
            .as_deref()
            .unwrap()
            .contains("continuing"));
    }

    #[tokio::test]
    async fn test_quick_scan_failure_degrades_to_empty_ports() {
        let gateway = ScriptedGateway::new()
            .with_success("liveness", "ok")
            .with_failure("port_scan", "nmap is not installed");
        let orch = orchestrator(gateway, Arc::new(AcceptingQueue));

        let summary = orch.start_session("10.0.0.9", "c1").await.unwrap();
        assert!(summary.open_ports.is_empty());
        // Session still reaches submission
        assert!(summary.stages_completed.contains(&"submit_task".to_string()));
    }

    #[tokio::test]
    async fn test_submission_failure_is_fatal() {
        let gateway = ScriptedGateway::new()
            .with_success("liveness", "ok")
            .with_success("port_scan", "22/tcp open ssh");
        let orch = orchestrator(gateway, Arc::new(RejectingQueue));

        let result = orch.start_session("10.0.0.9", "c1").await;
        assert!(matches!(result, Err(OrchestratorError::Submission(_))));

        let events = drain_events(orch.bus(), "c1").await;
        let last = events.last().unwrap();
        assert_eq!(last.error_stage.as_deref(), Some("submit_task"));
        // The failure ends the stream and retires the session
        assert!(last.is_terminal());
        assert!(orch.registry().is_empty());
    }

    #[tokio::test]
    async fn test_worker_drives_session_to_complete() {
        let xml = r#"<port protocol="tcp" portid="22"><state state="open"/><service name="ssh"/></port>"#;
        let gateway = ScriptedGateway::new()
            .with_success("liveness", "ok")
            .with_success("port_scan", xml)
            .with_success("vuln_scan", "");
        let orch = orchestrator(gateway, Arc::new(AcceptingQueue));

        let summary = orch.start_session("10.0.0.9", "c1").await.unwrap();
        let descriptor = JobDescriptor {
            session_id: summary.session_id,
            target: summary.target.clone(),
            channel: summary.channel.clone(),
        };
        orch.execute_job(descriptor).await;

        let events = drain_events(orch.bus(), "c1").await;
        assert!(events.last().unwrap().is_terminal());
        // The session was finished and retired
        assert!(orch.registry().lookup(summary.session_id).is_none());
        assert!(orch.registry().is_empty());
    }

    #[tokio::test]
    async fn test_worker_total_loss_ends_stream_with_terminal_failure() {
        // A consumer draining the channel after the worker gives up must
        // see a terminal event, not an endless run of heartbeats.
        let gateway = ScriptedGateway::new()
            .with_failure("liveness", "no response")
            .with_failure("port_scan", "dead")
            .with_failure("vuln_scan", "also dead");
        let orch = orchestrator(gateway, Arc::new(AcceptingQueue));

        let summary = orch.start_session("10.0.0.9", "c1").await.unwrap();
        let descriptor = JobDescriptor {
            session_id: summary.session_id,
            target: summary.target.clone(),
            channel: summary.channel.clone(),
        };
        orch.execute_job(descriptor).await;

        let events = drain_events(orch.bus(), "c1").await;
        let last = events.last().unwrap();
        assert!(last.is_terminal());
        assert_eq!(last.kind, crate::bus::EventKind::Failed);
        assert_eq!(last.error_stage.as_deref(), Some("deep_scan"));
        assert!(orch.registry().is_empty());
    }

    #[tokio::test]
    async fn test_deep_scan_partial_failure_continues() {
        let vuln_line =
            r#"{"template-id":"x","info":{"name":"X","severity":"high"},"matched-at":"h:1"}"#;
        let gateway = ScriptedGateway::new()
            .with_failure("port_scan", "enumeration died")
            .with_success("vuln_scan", vuln_line);
        let orch = orchestrator(gateway, Arc::new(AcceptingQueue));

        let descriptor = JobDescriptor {
            session_id: SessionId::new(),
            target: ScanTarget::parse("10.0.0.9").unwrap(),
            channel: "c1".to_string(),
        };
        let report = orch.run_deep_scan(&descriptor).await.unwrap();
        assert!(report.ports.is_empty());
        assert_eq!(report.vulnerabilities.len(), 1);

        let events = drain_events(orch.bus(), "c1").await;
        // Phase error, then the pipeline continued to a terminal complete
        assert!(events.iter().any(|e| e.error_stage.as_deref() == Some("deep_scan")));
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_deep_scan_total_loss_fails() {
        let gateway = ScriptedGateway::new()
            .with_failure("port_scan", "dead")
            .with_failure("vuln_scan", "also dead");
        let orch = orchestrator(gateway, Arc::new(AcceptingQueue));

        let descriptor = JobDescriptor {
            session_id: SessionId::new(),
            target: ScanTarget::parse("10.0.0.9").unwrap(),
            channel: "c1".to_string(),
        };
        let result = orch.run_deep_scan(&descriptor).await;
        assert!(matches!(result, Err(OrchestratorError::DeepScanLost { .. })));

        let events = drain_events(orch.bus(), "c1").await;
        assert!(!events.iter().any(|e| e.is_terminal()));
    }

    #[tokio::test]
    async fn test_deep_scan_xml_payload_normalized() {
        let xml = r#"<?xml version="1.0"?><nmaprun><host><address addr="10.0.0.9"/>
<port protocol="tcp" portid="22"><state state="open"/><service name="ssh" product="OpenSSH" version="7.4"/></port>
<osmatch name="Linux 5.X" accuracy="96"/></host></nmaprun>"#;
        let gateway = ScriptedGateway::new()
            .with_success("port_scan", xml)
            .with_success("vuln_scan", "");
        let orch = orchestrator(gateway, Arc::new(AcceptingQueue));

        let descriptor = JobDescriptor {
            session_id: SessionId::new(),
            target: ScanTarget::parse("10.0.0.9").unwrap(),
            channel: "c1".to_string(),
        };
        let report = orch.run_deep_scan(&descriptor).await.unwrap();
        assert_eq!(report.ports.len(), 1);
        assert_eq!(report.host.address.as_deref(), Some("10.0.0.9"));
        assert_eq!(report.host.os_matches[0].name, "Linux 5.X");
    }
}
