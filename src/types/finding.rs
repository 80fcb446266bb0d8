//! Canonical finding model.
//!
//! Port and vulnerability findings are read-only projections produced by
//! the result normalizer from raw tool output. Severity is always one of
//! five canonical levels; anything a tool emits outside that set coerces
//! to `Info` so downstream aggregation never special-cases freeform text.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::LazyLock;

/// Transport protocol of a scanned port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
}

impl Protocol {
    /// Parse a protocol token, defaulting to TCP for anything unknown.
    pub fn parse_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Self::Udp,
            "sctp" => Self::Sctp,
            _ => Self::Tcp,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
            Self::Sctp => write!(f, "sctp"),
        }
    }
}

/// Observed state of a scanned port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
    Closed,
    Filtered,
    #[serde(rename = "open|filtered")]
    OpenFiltered,
    Unknown,
}

impl PortState {
    /// Parse a state token as reported by scanning tools.
    pub fn parse_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "open" => Self::Open,
            "closed" => Self::Closed,
            "filtered" => Self::Filtered,
            "open|filtered" => Self::OpenFiltered,
            _ => Self::Unknown,
        }
    }

    /// Whether the port may be accepting connections.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open | Self::OpenFiltered)
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Filtered => write!(f, "filtered"),
            Self::OpenFiltered => write!(f, "open|filtered"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Service details attached to a port finding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service name as reported or inferred (e.g. "ssh").
    pub name: String,
    /// Product string from version probing, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    /// Version string from version probing, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ServiceInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            product: None,
            version: None,
        }
    }
}

/// A normalized port finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortFinding {
    pub port: u16,
    pub protocol: Protocol,
    pub state: PortState,
    pub service: ServiceInfo,
    /// Risk tier from the static port/service classification tables.
    pub risk: RiskTier,
}

impl PortFinding {
    /// Build a finding, deriving the risk tier from port and service name.
    pub fn new(port: u16, protocol: Protocol, state: PortState, service: ServiceInfo) -> Self {
        let risk = classify_port_risk(port, &service.name);
        Self {
            port,
            protocol,
            state,
            service,
            risk,
        }
    }
}

/// Canonical vulnerability severity levels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Normalize an arbitrary severity string to a canonical level.
    ///
    /// Total and idempotent: any input maps to one of the five levels,
    /// with `Info` as the catch-all.
    pub fn normalize(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Info,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A normalized vulnerability finding from a template scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityFinding {
    /// Template identifier (e.g. "CVE-2021-44228" or "ssl-weak-cipher").
    pub template_id: String,
    /// Human-readable finding name.
    pub name: String,
    pub severity: Severity,
    /// The URL or host:port where the template matched.
    pub matched_at: String,
    /// Associated CVE identifiers.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub cve_ids: BTreeSet<String>,
    /// Reference URLs.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub references: BTreeSet<String>,
}

/// Risk tier assigned to a port finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Critical,
    Medium,
    Low,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Ports that are high-value attack surface regardless of service banner.
static CRITICAL_PORTS: LazyLock<HashSet<u16>> = LazyLock::new(|| {
    let mut s = HashSet::new();
    s.insert(21); // ftp
    s.insert(22); // ssh
    s.insert(23); // telnet
    s.insert(135); // msrpc
    s.insert(139); // netbios-ssn
    s.insert(445); // microsoft-ds
    s.insert(1433); // mssql
    s.insert(3306); // mysql
    s.insert(3389); // rdp
    s.insert(5432); // postgresql
    s.insert(5900); // vnc
    s.insert(6379); // redis
    s
});

/// Service names whose cleartext or remote-access nature is risky on any port.
static CRITICAL_SERVICES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    let mut s = HashSet::new();
    s.insert("telnet");
    s.insert("ftp");
    s.insert("rlogin");
    s.insert("rsh");
    s.insert("vnc");
    s.insert("rdp");
    s.insert("ms-wbt-server");
    s.insert("redis");
    s
});

/// Classify the risk tier of `(port, service)`.
///
/// Pure and stateless: the same input always yields the same tier.
/// Well-known dangerous ports and cleartext/remote-access services are
/// critical; other privileged ports are medium; everything else is low.
pub fn classify_port_risk(port: u16, service: &str) -> RiskTier {
    let service = service.to_ascii_lowercase();

    if CRITICAL_PORTS.contains(&port) || CRITICAL_SERVICES.contains(service.as_str()) {
        return RiskTier::Critical;
    }

    if port < 1024 {
        return RiskTier::Medium;
    }

    RiskTier::Low
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_normalize_canonical() {
        assert_eq!(Severity::normalize("critical"), Severity::Critical);
        assert_eq!(Severity::normalize("HIGH"), Severity::High);
        assert_eq!(Severity::normalize(" Medium "), Severity::Medium);
        assert_eq!(Severity::normalize("low"), Severity::Low);
        assert_eq!(Severity::normalize("info"), Severity::Info);
    }

    #[test]
    fn test_severity_normalize_unknown_coerces_to_info() {
        assert_eq!(Severity::normalize("catastrophic"), Severity::Info);
        assert_eq!(Severity::normalize(""), Severity::Info);
        assert_eq!(Severity::normalize("unknown"), Severity::Info);
    }

    #[test]
    fn test_severity_normalize_idempotent() {
        for input in ["critical", "HIGH", "weird", "", "låg"] {
            let once = Severity::normalize(input);
            let twice = Severity::normalize(&once.to_string());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Info < Severity::Low);
    }

    #[test]
    fn test_risk_critical_ports() {
        assert_eq!(classify_port_risk(22, "ssh"), RiskTier::Critical);
        assert_eq!(classify_port_risk(3389, "rdp"), RiskTier::Critical);
        assert_eq!(classify_port_risk(445, "microsoft-ds"), RiskTier::Critical);
    }

    #[test]
    fn test_risk_critical_service_on_odd_port() {
        // Telnet moved to a high port is still telnet
        assert_eq!(classify_port_risk(2323, "telnet"), RiskTier::Critical);
    }

    #[test]
    fn test_risk_privileged_port_is_medium() {
        assert_eq!(classify_port_risk(80, "http"), RiskTier::Medium);
        assert_eq!(classify_port_risk(443, "https"), RiskTier::Medium);
    }

    #[test]
    fn test_risk_high_port_is_low() {
        assert_eq!(classify_port_risk(8080, "http-proxy"), RiskTier::Low);
    }

    #[test]
    fn test_risk_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(classify_port_risk(8443, "https-alt"), RiskTier::Low);
        }
    }

    #[test]
    fn test_port_finding_derives_risk() {
        let finding = PortFinding::new(
            22,
            Protocol::Tcp,
            PortState::Open,
            ServiceInfo::named("ssh"),
        );
        assert_eq!(finding.risk, RiskTier::Critical);
    }

    #[test]
    fn test_port_state_parse_lossy() {
        assert_eq!(PortState::parse_lossy("open"), PortState::Open);
        assert_eq!(PortState::parse_lossy("OPEN"), PortState::Open);
        assert_eq!(PortState::parse_lossy("open|filtered"), PortState::OpenFiltered);
        assert_eq!(PortState::parse_lossy("banana"), PortState::Unknown);
    }
}
