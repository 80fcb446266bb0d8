//! The `scan` and `check` subcommands.

use crate::bus::{EventBus, EventKind, ProgressEvent};
use crate::config::ScanSettings;
use crate::gateway::{ScanToolGateway, ToolGateway};
use crate::jobs::{InlineJobQueue, JobDescriptor, JobId, JobQueue, JobRunner, SubmissionError};
use crate::orchestrator::ScanOrchestrator;
use crate::registry::SessionRegistry;
use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Run a progressive scan against a target.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Target host, IP address, or domain
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Progress channel key (defaults to a fresh UUID)
    #[arg(long, value_name = "CHANNEL")]
    pub channel: Option<String>,

    /// Remote scanning service base URL (overrides settings)
    #[arg(long, env = "SCANFLOW_REMOTE_URL", value_name = "URL")]
    pub remote: Option<String>,

    /// Request target intelligence before scanning
    #[arg(long)]
    pub analyze: bool,

    /// Emit events as JSON lines instead of styled text
    #[arg(long)]
    pub json: bool,
}

/// Probe the remote scanning service.
#[derive(Parser, Debug)]
pub struct CheckCommand {
    /// Remote scanning service base URL (overrides settings)
    #[arg(long, env = "SCANFLOW_REMOTE_URL", value_name = "URL")]
    pub remote: Option<String>,
}

/// The deep scan is spawned inline; the worker itself never resubmits.
struct NoResubmit;

#[async_trait]
impl JobQueue for NoResubmit {
    async fn submit(&self, _descriptor: JobDescriptor) -> Result<JobId, SubmissionError> {
        Err(SubmissionError("worker context cannot submit jobs".to_string()))
    }
}

fn load_settings(config: Option<&PathBuf>, remote: Option<String>) -> anyhow::Result<ScanSettings> {
    let mut settings = match config {
        Some(path) => ScanSettings::load_from(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => ScanSettings::load().context("loading settings")?,
    };
    if remote.is_some() {
        settings.remote_url = remote;
    }
    Ok(settings)
}

fn build_gateway(settings: &ScanSettings) -> Arc<dyn ToolGateway> {
    match &settings.remote_url {
        Some(url) => Arc::new(ScanToolGateway::new(url.clone(), settings.gateway_rate_limit)),
        None => Arc::new(ScanToolGateway::local_only(settings.gateway_rate_limit)),
    }
}

impl ScanCommand {
    pub async fn run(self, config: Option<PathBuf>) -> anyhow::Result<()> {
        let settings = load_settings(config.as_ref(), self.remote.clone())?;
        let channel = self
            .channel
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let gateway = build_gateway(&settings);
        let bus = EventBus::with_capacity(settings.channel_capacity, settings.channel_max_idle());
        let registry = SessionRegistry::new();

        if self.analyze {
            match gateway.analyze_target(&self.target, "quick").await {
                Ok(intel) if !intel.is_null() => {
                    println!("{}", style("Target intelligence:").bold());
                    println!("{}", serde_json::to_string_pretty(&intel)?);
                }
                Ok(_) => {}
                Err(e) => eprintln!("{} {e}", style("intelligence unavailable:").yellow()),
            }
        }

        // Worker-side orchestrator, sharing the bus and registry with the
        // synchronous path.
        let worker = Arc::new(ScanOrchestrator::new(
            gateway.clone(),
            Arc::new(NoResubmit),
            bus.clone(),
            registry.clone(),
            settings.clone(),
        ));
        let runner: JobRunner = Arc::new(move |descriptor| {
            let worker = worker.clone();
            Box::pin(async move { worker.execute_job(descriptor).await })
        });

        let orchestrator = ScanOrchestrator::new(
            gateway,
            Arc::new(InlineJobQueue::new(runner)),
            bus.clone(),
            registry,
            settings.clone(),
        );

        let summary = orchestrator
            .start_session(&self.target, &channel)
            .await
            .context("scan session failed")?;

        if !self.json {
            println!(
                "{} {} ({} open ports up front, job {})",
                style("Scanning").bold().green(),
                summary.target,
                summary.open_ports.len(),
                summary.job_id,
            );
        }

        self.stream_events(&bus, &channel, &settings).await;
        Ok(())
    }

    /// Consume the session's events until the terminal one, rendering
    /// each as it arrives.
    async fn stream_events(&self, bus: &EventBus, channel: &str, settings: &ScanSettings) {
        let deadline =
            tokio::time::Instant::now() + settings.deep_scan_budget() + Duration::from_secs(30);

        loop {
            if tokio::time::Instant::now() > deadline {
                eprintln!("{}", style("deep scan exceeded its budget; giving up").red());
                return;
            }

            let event = bus.next_event(channel, settings.poll_timeout()).await;
            self.render(&event);
            if event.is_terminal() {
                return;
            }
        }
    }

    fn render(&self, event: &ProgressEvent) {
        if self.json {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
            return;
        }

        match event.kind {
            EventKind::Progress => {
                let percent = event.percent.unwrap_or(0);
                println!(
                    "{} {}",
                    style(format!("[{percent:>3}%]")).cyan(),
                    event.message.as_deref().unwrap_or(""),
                );
            }
            EventKind::Error => {
                println!(
                    "{} {} ({})",
                    style("[error]").red().bold(),
                    event.message.as_deref().unwrap_or(""),
                    event.error_stage.as_deref().unwrap_or("unknown stage"),
                );
            }
            EventKind::Failed => {
                println!(
                    "{} {} ({})",
                    style("[failed]").red().bold(),
                    event.message.as_deref().unwrap_or(""),
                    event.error_stage.as_deref().unwrap_or("unknown stage"),
                );
            }
            EventKind::Complete => {
                println!(
                    "{} {}",
                    style("[done]").green().bold(),
                    event.message.as_deref().unwrap_or(""),
                );
            }
            EventKind::Heartbeat => {
                println!("{}", style("[..] still working").dim());
            }
        }
    }
}

impl CheckCommand {
    pub async fn run(self, config: Option<PathBuf>) -> anyhow::Result<()> {
        let settings = load_settings(config.as_ref(), self.remote.clone())?;

        match &settings.remote_url {
            None => {
                println!(
                    "{} no remote service configured; scans run local tools",
                    style("local:").yellow()
                );
            }
            Some(url) => {
                let gateway = build_gateway(&settings);
                if gateway.health().await {
                    println!("{} {url} is healthy", style("ok:").green());
                } else {
                    println!(
                        "{} {url} unreachable; scans will fall back to local tools",
                        style("down:").red()
                    );
                }
            }
        }
        Ok(())
    }
}
