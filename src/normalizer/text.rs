//! Plain-text output extraction.
//!
//! The fallback for tools writing human-oriented output. ANSI color codes
//! are stripped before matching; lines that do not match the expected
//! shape are ignored.

use crate::types::{PortFinding, PortState, Protocol, ServiceInfo, Severity, VulnerabilityFinding};
use regex::Regex;
use std::sync::LazyLock;

static ANSI_CODES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("ansi regex"));

/// `port/protocol state service [extra]`, the nmap table row shape.
static PORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(\d{1,5})/(tcp|udp|sctp)\s+(\S+)\s+(\S+)(?:\s+(.+?))?\s*$")
        .expect("port line regex")
});

/// `[template-id] [protocol] [severity] matched-at`, the template-scanner
/// console row shape.
static VULN_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*\[([^\]]+)\]\s+\[([^\]]+)\]\s+\[([^\]]+)\]\s+(\S+)")
        .expect("vuln line regex")
});

/// Split an "extra" column into product and trailing version.
static PRODUCT_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s+(\d[\w.\-]*)$").expect("product/version regex"));

/// Remove ANSI escape sequences.
pub fn strip_ansi(raw: &str) -> String {
    ANSI_CODES.replace_all(raw, "").into_owned()
}

/// Parse port findings from line-oriented text output.
pub fn parse_ports(raw: &str) -> Vec<PortFinding> {
    let clean = strip_ansi(raw);

    PORT_LINE
        .captures_iter(&clean)
        .filter_map(|c| {
            let port: u16 = c[1].parse().ok()?;
            let protocol = Protocol::parse_lossy(&c[2]);
            let state = PortState::parse_lossy(&c[3]);

            let mut service = ServiceInfo::named(&c[4]);
            if let Some(extra) = c.get(5) {
                match PRODUCT_VERSION.captures(extra.as_str()) {
                    Some(pv) => {
                        service.product = Some(pv[1].to_string());
                        service.version = Some(pv[2].to_string());
                    }
                    None => service.product = Some(extra.as_str().to_string()),
                }
            }

            Some(PortFinding::new(port, protocol, state, service))
        })
        .collect()
}

/// Parse vulnerability findings from template-scanner console output.
pub fn parse_vulnerabilities(raw: &str) -> Vec<VulnerabilityFinding> {
    let clean = strip_ansi(raw);

    VULN_LINE
        .captures_iter(&clean)
        .map(|c| {
            let template_id = c[1].to_string();
            VulnerabilityFinding {
                name: template_id.clone(),
                template_id,
                severity: Severity::normalize(&c[3]),
                matched_at: c[4].to_string(),
                cve_ids: Default::default(),
                references: Default::default(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        let colored = "\x1b[32m22/tcp\x1b[0m open ssh";
        assert_eq!(strip_ansi(colored), "22/tcp open ssh");
    }

    #[test]
    fn test_parse_port_table() {
        let raw = "\
PORT     STATE    SERVICE  VERSION
22/tcp   open     ssh      OpenSSH 7.4
80/tcp   open     http     nginx 1.24.0
443/tcp  filtered https
53/udp   open|filtered dns
Nmap done: 1 IP address (1 host up)";

        let findings = parse_ports(raw);
        assert_eq!(findings.len(), 4);

        assert_eq!(findings[0].port, 22);
        assert_eq!(findings[0].service.product.as_deref(), Some("OpenSSH"));
        assert_eq!(findings[0].service.version.as_deref(), Some("7.4"));

        assert_eq!(findings[2].state, PortState::Filtered);
        assert_eq!(findings[2].service.product, None);

        assert_eq!(findings[3].protocol, Protocol::Udp);
        assert_eq!(findings[3].state, PortState::OpenFiltered);
    }

    #[test]
    fn test_colored_port_lines() {
        let raw = "\x1b[1;32m3306/tcp open  mysql   MySQL 8.0.35\x1b[0m";
        let findings = parse_ports(raw);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].service.name, "mysql");
        assert_eq!(findings[0].service.version.as_deref(), Some("8.0.35"));
    }

    #[test]
    fn test_noise_lines_ignored() {
        let raw = "Starting scan at 12:00\nHost is up (0.0010s latency).\n";
        assert!(parse_ports(raw).is_empty());
    }

    #[test]
    fn test_parse_vuln_console_lines() {
        let raw = "\
[ssl-weak-cipher] [ssl] [medium] 10.0.0.9:443
\x1b[31m[CVE-2017-0144] [tcp] [critical] 10.0.0.9:445\x1b[0m
[INF] Using templates: 812";

        let findings = parse_vulnerabilities(raw);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[1].template_id, "CVE-2017-0144");
        assert_eq!(findings[1].severity, Severity::Critical);
        assert_eq!(findings[1].matched_at, "10.0.0.9:445");
    }
}
