//! JSON output extraction.
//!
//! Two shapes arrive here: a single JSON object from a port scanner
//! (fields looked up by key with permissive defaults), and JSON-lines
//! from a vulnerability template scanner (one object per line, malformed
//! lines skipped).

use crate::error::ParseError;
use crate::types::{PortFinding, PortState, Protocol, ServiceInfo, Severity, VulnerabilityFinding};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// Parse port findings from a single JSON object (or array of entries).
///
/// Accepts either `{"ports": [...]}` or a bare array; each entry is read
/// by key lookup with defaults, so partially-populated records still
/// yield findings.
pub fn parse_ports(raw: &str) -> Vec<PortFinding> {
    let value: Value = match serde_json::from_str(raw.trim()) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "port output is not valid JSON");
            return Vec::new();
        }
    };

    let entries = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("ports").and_then(Value::as_array) {
            Some(items) => items.as_slice(),
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    entries.iter().filter_map(port_entry).collect()
}

fn port_entry(entry: &Value) -> Option<PortFinding> {
    let port = entry
        .get("port")
        .or_else(|| entry.get("portid"))
        .and_then(value_as_u16)?;

    let protocol = Protocol::parse_lossy(str_field(entry, "protocol").as_deref().unwrap_or("tcp"));
    let state = PortState::parse_lossy(str_field(entry, "state").as_deref().unwrap_or("open"));

    // "service" may be a bare name or a nested object.
    let service = match entry.get("service") {
        Some(Value::Object(obj)) => ServiceInfo {
            name: obj
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            product: obj.get("product").and_then(Value::as_str).map(String::from),
            version: obj.get("version").and_then(Value::as_str).map(String::from),
        },
        Some(Value::String(name)) => ServiceInfo {
            name: name.clone(),
            product: str_field(entry, "product"),
            version: str_field(entry, "version"),
        },
        _ => ServiceInfo::named("unknown"),
    };

    Some(PortFinding::new(port, protocol, state, service))
}

/// Parse vulnerability findings from JSON-lines output.
///
/// A line that fails to parse is skipped, not fatal to the batch.
pub fn parse_vulnerabilities(raw: &str) -> Vec<VulnerabilityFinding> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| match serde_json::from_str::<Value>(line) {
            Ok(v) => vulnerability_entry(&v),
            Err(e) => {
                let err = ParseError::from(e);
                debug!(error = %err, "skipping malformed vulnerability record");
                None
            }
        })
        .collect()
}

fn vulnerability_entry(entry: &Value) -> Option<VulnerabilityFinding> {
    let template_id = str_field(entry, "template-id")
        .or_else(|| str_field(entry, "template_id"))
        .or_else(|| str_field(entry, "templateID"))?;

    let info = entry.get("info");
    let name = info
        .and_then(|i| i.get("name"))
        .and_then(Value::as_str)
        .unwrap_or(&template_id)
        .to_string();

    let severity = Severity::normalize(
        info.and_then(|i| i.get("severity"))
            .and_then(Value::as_str)
            .unwrap_or(""),
    );

    let matched_at = str_field(entry, "matched-at")
        .or_else(|| str_field(entry, "matched_at"))
        .or_else(|| str_field(entry, "host"))
        .unwrap_or_default();

    let cve_ids = info
        .and_then(|i| i.get("classification"))
        .and_then(|c| c.get("cve-id"))
        .map(string_set)
        .unwrap_or_default();

    let references = info
        .and_then(|i| i.get("reference"))
        .map(string_set)
        .unwrap_or_default();

    Some(VulnerabilityFinding {
        template_id,
        name,
        severity,
        matched_at,
        cve_ids,
        references,
    })
}

fn str_field(entry: &Value, key: &str) -> Option<String> {
    entry.get(key).and_then(Value::as_str).map(String::from)
}

fn value_as_u16(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Collect a string or array-of-strings value into a set.
fn string_set(value: &Value) -> BTreeSet<String> {
    match value {
        Value::String(s) => BTreeSet::from([s.clone()]),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => BTreeSet::new(),
    }
}
