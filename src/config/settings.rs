//! Scan settings and paths.
//!
//! Every timing and capacity knob the orchestrator, gateway, and event
//! bus use lives here, with defaults matching the documented stage
//! budgets. Settings load from an XDG-compliant JSON file when present.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Global paths singleton.
static PATHS: OnceLock<Paths> = OnceLock::new();

/// Application directory paths following the XDG Base Directory spec.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/scanflow)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Get the global paths instance.
    pub fn get() -> &'static Paths {
        PATHS.get_or_init(|| Self::new().expect("Failed to initialize paths"))
    }

    fn new() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("io", "scanflow", "scanflow").ok_or(ConfigError::DirectoryNotFound)?;

        let paths = Self {
            config_dir: project.config_dir().to_path_buf(),
        };

        fs::create_dir_all(&paths.config_dir)?;

        Ok(paths)
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Orchestrator, gateway, and bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Base URL of the remote scanning service, if any.
    pub remote_url: Option<String>,
    /// Liveness check timeout in seconds.
    pub ping_timeout_secs: u64,
    /// Hard timeout for the fast port enumeration in seconds.
    pub quick_scan_timeout_secs: u64,
    /// Number of top ports to probe in the fast enumeration.
    pub quick_scan_top_ports: u16,
    /// Overall budget for the deep-scan job in seconds.
    pub deep_scan_budget_secs: u64,
    /// Vulnerability scan request rate limit (requests per second).
    pub vuln_rate_limit: u32,
    /// Vulnerability scan template concurrency.
    pub vuln_concurrency: u32,
    /// Vulnerability scan per-request timeout in seconds.
    pub vuln_request_timeout_secs: u64,
    /// Vulnerability scan retries per request.
    pub vuln_retries: u32,
    /// Gateway invocation pacing (invocations per second).
    pub gateway_rate_limit: u32,
    /// Per-channel event queue capacity.
    pub channel_capacity: usize,
    /// Bounded consumer wait before a heartbeat, in seconds.
    pub poll_timeout_secs: u64,
    /// Idle age after which a channel may be evicted, in seconds.
    pub channel_max_idle_secs: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            remote_url: None,
            ping_timeout_secs: 5,
            quick_scan_timeout_secs: 60,
            quick_scan_top_ports: 100,
            deep_scan_budget_secs: 600,
            vuln_rate_limit: 50,
            vuln_concurrency: 10,
            vuln_request_timeout_secs: 10,
            vuln_retries: 1,
            gateway_rate_limit: 10,
            channel_capacity: 1024,
            poll_timeout_secs: 30,
            channel_max_idle_secs: 1800,
        }
    }
}

impl ScanSettings {
    /// Load settings from the default location.
    pub fn load() -> ConfigResult<Self> {
        let paths = Paths::get();
        let file = paths.settings_file();

        if !file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn quick_scan_timeout(&self) -> Duration {
        Duration::from_secs(self.quick_scan_timeout_secs)
    }

    pub fn deep_scan_budget(&self) -> Duration {
        Duration::from_secs(self.deep_scan_budget_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn channel_max_idle(&self) -> Duration {
        Duration::from_secs(self.channel_max_idle_secs)
    }
}
