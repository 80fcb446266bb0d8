//! Scan target validation.
//!
//! A target is the user-supplied host, IP address, or domain a session runs
//! against. The string eventually reaches subprocess argument lists and
//! remote tool payloads, so validation rejects anything that is not a
//! plausible host token rather than trying to sanitize it later.

use crate::error::OrchestratorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// A validated scan target (hostname, IP address, or domain).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanTarget(String);

impl ScanTarget {
    /// Validate and wrap a raw target string.
    ///
    /// Accepts IP addresses (v4 and v6) and hostnames/domains. Rejects
    /// empty input and anything containing whitespace or shell
    /// metacharacters with [`OrchestratorError::InvalidTarget`].
    pub fn parse(s: &str) -> Result<Self, OrchestratorError> {
        let s = s.trim();

        if s.is_empty() {
            return Err(OrchestratorError::InvalidTarget(
                "target must not be empty".to_string(),
            ));
        }

        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self(ip.to_string()));
        }

        if !is_valid_hostname(s) {
            return Err(OrchestratorError::InvalidTarget(s.to_string()));
        }

        Ok(Self(s.to_string()))
    }

    /// The validated target string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScanTarget {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Check if a string is a valid hostname.
fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    // Each label must be 1-63 characters, alphanumeric with interior hyphens
    for label in s.split('.') {
        if label.is_empty() || label.len() > 63 {
            return false;
        }
        if !label.chars().next().is_some_and(|c| c.is_alphanumeric()) {
            return false;
        }
        if !label.chars().last().is_some_and(|c| c.is_alphanumeric()) {
            return false;
        }
        if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4() {
        let target = ScanTarget::parse("192.168.1.1").unwrap();
        assert_eq!(target.as_str(), "192.168.1.1");
    }

    #[test]
    fn test_parse_ipv6() {
        assert!(ScanTarget::parse("::1").is_ok());
    }

    #[test]
    fn test_parse_hostname() {
        let target = ScanTarget::parse("scanme.example.com").unwrap();
        assert_eq!(target.as_str(), "scanme.example.com");
    }

    #[test]
    fn test_empty_target_rejected() {
        assert!(matches!(
            ScanTarget::parse("   "),
            Err(OrchestratorError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_shell_metacharacters_rejected() {
        assert!(ScanTarget::parse("example.com; rm -rf /").is_err());
        assert!(ScanTarget::parse("host`id`").is_err());
        assert!(ScanTarget::parse("a b").is_err());
    }

    #[test]
    fn test_leading_hyphen_label_rejected() {
        assert!(ScanTarget::parse("-bad.example.com").is_err());
    }
}
