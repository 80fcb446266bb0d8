//! Result normalizer.
//!
//! Turns heterogeneous raw tool output (XML, single JSON object, JSON
//! lines, free text) into the canonical finding model. A single classifier
//! decides the format once; per-format parsers do the extraction. Records
//! that fail to parse are skipped and logged, never fatal to the batch.
//! Returned collections are deduplicated and severity-normalized, ready
//! for handoff to a reporting collaborator.

pub mod json;
pub mod text;
pub mod xml;

use crate::types::{PortFinding, VulnerabilityFinding};
use std::collections::HashSet;
use tracing::debug;

/// Raw tool output classified by format.
///
/// Produced once per invocation by [`RawOutput::classify`]; parsers route
/// on the variant instead of re-sniffing the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOutput {
    /// Output starting with an XML prolog or element.
    Xml(String),
    /// A single JSON object.
    JsonObject(String),
    /// One JSON object per line (template-scanner style).
    JsonLines(String),
    /// Anything else; parsed line-by-line with regexes.
    PlainText(String),
}

impl RawOutput {
    /// Classify raw output by inspecting its shape.
    ///
    /// XML is detected by prolog or leading `<`; a leading `{` means JSON,
    /// with multiple object lines classified as JSON-lines; everything
    /// else falls back to plain text.
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim_start();

        if trimmed.starts_with("<?xml") || trimmed.starts_with('<') {
            return Self::Xml(raw.to_string());
        }

        if trimmed.starts_with('{') {
            let object_lines = trimmed
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .take(3)
                .filter(|l| l.starts_with('{'))
                .count();
            if object_lines > 1 {
                return Self::JsonLines(raw.to_string());
            }
            // A single multi-line object still parses as one document.
            if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
                return Self::JsonObject(raw.to_string());
            }
            return Self::JsonLines(raw.to_string());
        }

        Self::PlainText(raw.to_string())
    }
}

/// Parse raw port-scan output in any supported format.
pub fn parse_ports(raw: &str) -> Vec<PortFinding> {
    let findings = match RawOutput::classify(raw) {
        RawOutput::Xml(s) => xml::parse_ports(&s),
        RawOutput::JsonObject(s) | RawOutput::JsonLines(s) => json::parse_ports(&s),
        RawOutput::PlainText(s) => text::parse_ports(&s),
    };
    dedup_ports(findings)
}

/// Parse raw vulnerability-scan output in any supported format.
pub fn parse_vulnerabilities(raw: &str) -> Vec<VulnerabilityFinding> {
    let findings = match RawOutput::classify(raw) {
        RawOutput::JsonObject(s) | RawOutput::JsonLines(s) => json::parse_vulnerabilities(&s),
        RawOutput::Xml(s) | RawOutput::PlainText(s) => text::parse_vulnerabilities(&s),
    };
    dedup_vulnerabilities(findings)
}

/// Keep the first finding per `(port, protocol)` pair.
fn dedup_ports(findings: Vec<PortFinding>) -> Vec<PortFinding> {
    let mut seen = HashSet::new();
    let before = findings.len();
    let deduped: Vec<PortFinding> = findings
        .into_iter()
        .filter(|f| seen.insert((f.port, f.protocol)))
        .collect();
    if deduped.len() < before {
        debug!(dropped = before - deduped.len(), "deduplicated port findings");
    }
    deduped
}

/// Keep the first finding per `(template_id, matched_at)` pair.
fn dedup_vulnerabilities(findings: Vec<VulnerabilityFinding>) -> Vec<VulnerabilityFinding> {
    let mut seen = HashSet::new();
    findings
        .into_iter()
        .filter(|f| seen.insert((f.template_id.clone(), f.matched_at.clone())))
        .collect()
}
