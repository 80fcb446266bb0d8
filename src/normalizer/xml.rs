//! XML output extraction.
//!
//! Handles the nmap-style XML document: per-port `state` and `service`
//! elements, the host address and hostnames, and OS matches with accuracy
//! percentages. Extraction is attribute-oriented regex matching over
//! well-formed scanner output; a port block missing its state element is
//! skipped rather than failing the document.

use crate::types::{PortFinding, PortState, Protocol, ServiceInfo};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;

static PORT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<port\s+protocol="([^"]+)"\s+portid="(\d+)"\s*>(.*?)</port>"#)
        .expect("port block regex")
});

static STATE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<state\s+[^>]*state="([^"]+)""#).expect("state regex"));

static SERVICE_ELEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<service\s+([^>]*)/?>"#).expect("service regex"));

static ADDRESS_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<address\s+addr="([^"]+)""#).expect("address regex"));

static HOSTNAME_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<hostname\s+name="([^"]+)""#).expect("hostname regex"));

static OSMATCH_ELEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<osmatch\s+name="([^"]+)"\s+accuracy="(\d+)""#).expect("osmatch regex")
});

static SERVICE_NAME_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|\s)name="([^"]*)""#).expect("service name regex"));

static SERVICE_PRODUCT_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|\s)product="([^"]*)""#).expect("service product regex"));

static SERVICE_VERSION_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|\s)version="([^"]*)""#).expect("service version regex"));

/// Pull one attribute value out of a service element's attribute list.
fn attr(re: &Regex, attrs: &str) -> Option<String> {
    re.captures(attrs).map(|c| c[1].to_string())
}

/// Parse port findings from an XML document.
pub fn parse_ports(raw: &str) -> Vec<PortFinding> {
    let mut findings = Vec::new();

    for block in PORT_BLOCK.captures_iter(raw) {
        let protocol = Protocol::parse_lossy(&block[1]);
        let port: u16 = match block[2].parse() {
            Ok(p) => p,
            Err(_) => {
                debug!(portid = &block[2], "skipping port with out-of-range id");
                continue;
            }
        };
        let body = &block[3];

        let state = match STATE_ATTR.captures(body) {
            Some(c) => PortState::parse_lossy(&c[1]),
            None => {
                debug!(port, "skipping port block without state element");
                continue;
            }
        };

        let service = match SERVICE_ELEM.captures(body) {
            Some(c) => {
                let attrs = &c[1];
                ServiceInfo {
                    name: attr(&SERVICE_NAME_ATTR, attrs)
                        .unwrap_or_else(|| "unknown".to_string()),
                    product: attr(&SERVICE_PRODUCT_ATTR, attrs),
                    version: attr(&SERVICE_VERSION_ATTR, attrs),
                }
            }
            None => ServiceInfo::named("unknown"),
        };

        findings.push(PortFinding::new(port, protocol, state, service));
    }

    findings
}

/// An OS fingerprint candidate from the deep scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsMatch {
    pub name: String,
    /// Match accuracy in percent, 0..=100.
    pub accuracy: u8,
}

/// Host-level details extracted alongside port findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub os_matches: Vec<OsMatch>,
}

/// Parse host address, hostnames, and OS matches from an XML document.
pub fn parse_host_details(raw: &str) -> HostDetails {
    let address = ADDRESS_ATTR.captures(raw).map(|c| c[1].to_string());

    let hostnames = HOSTNAME_ATTR
        .captures_iter(raw)
        .map(|c| c[1].to_string())
        .collect();

    let os_matches = OSMATCH_ELEM
        .captures_iter(raw)
        .filter_map(|c| {
            let accuracy: u8 = c[2].parse().ok()?;
            Some(OsMatch {
                name: c[1].to_string(),
                accuracy: accuracy.min(100),
            })
        })
        .collect();

    HostDetails {
        address,
        hostnames,
        os_matches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskTier;

    const SINGLE_PORT: &str = r#"<port protocol="tcp" portid="22"><state state="open"/><service name="ssh" product="OpenSSH" version="7.4"/></port>"#;

    #[test]
    fn test_single_port_round_trip() {
        let findings = parse_ports(SINGLE_PORT);
        assert_eq!(findings.len(), 1);

        let f = &findings[0];
        assert_eq!(f.port, 22);
        assert_eq!(f.protocol, Protocol::Tcp);
        assert_eq!(f.state, PortState::Open);
        assert_eq!(f.service.name, "ssh");
        assert_eq!(f.service.product.as_deref(), Some("OpenSSH"));
        assert_eq!(f.service.version.as_deref(), Some("7.4"));
        assert_eq!(f.risk, RiskTier::Critical);
    }

    #[test]
    fn test_full_document() {
        let raw = r#"<?xml version="1.0" encoding="UTF-8"?>
<nmaprun scanner="nmap">
<host><address addr="10.0.0.9" addrtype="ipv4"/>
<hostnames><hostname name="web.internal" type="PTR"/></hostnames>
<ports>
<port protocol="tcp" portid="80"><state state="open" reason="syn-ack"/><service name="http" product="nginx" version="1.24.0"/></port>
<port protocol="tcp" portid="443"><state state="open" reason="syn-ack"/><service name="https"/></port>
<port protocol="tcp" portid="8080"><state state="filtered"/></port>
</ports>
<os><osmatch name="Linux 5.X" accuracy="96"/><osmatch name="Linux 4.15" accuracy="91"/></os>
</host>
</nmaprun>"#;

        let findings = parse_ports(raw);
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].service.product.as_deref(), Some("nginx"));
        assert_eq!(findings[1].service.version, None);
        assert_eq!(findings[2].state, PortState::Filtered);
        assert_eq!(findings[2].service.name, "unknown");

        let details = parse_host_details(raw);
        assert_eq!(details.address.as_deref(), Some("10.0.0.9"));
        assert_eq!(details.hostnames, vec!["web.internal"]);
        assert_eq!(details.os_matches.len(), 2);
        assert_eq!(details.os_matches[0].accuracy, 96);
    }

    #[test]
    fn test_port_without_state_skipped() {
        let raw = r#"<port protocol="tcp" portid="25"><service name="smtp"/></port>"#;
        assert!(parse_ports(raw).is_empty());
    }

    #[test]
    fn test_out_of_range_portid_skipped() {
        let raw = r#"<port protocol="tcp" portid="70000"><state state="open"/></port>"#;
        assert!(parse_ports(raw).is_empty());
    }

    #[test]
    fn test_empty_document() {
        assert!(parse_ports("<?xml version=\"1.0\"?><nmaprun/>").is_empty());
        assert_eq!(parse_host_details("<nmaprun/>"), HostDetails::default());
    }
}
