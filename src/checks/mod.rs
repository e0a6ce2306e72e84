// Compliance and security checks
//
// Every check is an independent probe-and-compare unit: it reads its own
// collaborator, compares against the configured baseline and produces one
// CheckResult. Checks never see each other's results.

pub mod compliance;
pub mod evaluator;
pub mod security;

use crate::Result;
use crate::config::AuditConfig;
use crate::sources::ConfigurationSources;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

pub use evaluator::Evaluator;

/// Which battery of checks to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckKind {
    Compliance,
    Security,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckKind::Compliance => write!(f, "compliance"),
            CheckKind::Security => write!(f, "security"),
        }
    }
}

impl FromStr for CheckKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compliance" => Ok(CheckKind::Compliance),
            "security" => Ok(CheckKind::Security),
            other => Err(format!("Unknown check kind: {}", other)),
        }
    }
}

/// Outcome of a single named check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub passed: bool,
    /// False when the collaborator behind the check could not be read
    pub data_available: bool,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl CheckResult {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            data_available: true,
            detail: detail.into(),
            recommendation: None,
        }
    }

    pub fn fail(detail: impl Into<String>, recommendation: impl Into<String>) -> Self {
        Self {
            passed: false,
            data_available: true,
            detail: detail.into(),
            recommendation: Some(recommendation.into()),
        }
    }

    /// The check could not run. Never counts as compliant.
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self {
            passed: false,
            data_available: false,
            detail: format!("data unavailable: {}", reason),
            recommendation: None,
        }
    }

    /// Failed with data in hand, i.e. an actual finding
    pub fn is_finding(&self) -> bool {
        !self.passed && self.data_available
    }
}

/// Check name → result. Ordered by name so output is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckSet(BTreeMap<String, CheckResult>);

impl CheckSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, result: CheckResult) {
        self.0.insert(name.into(), result);
    }

    pub fn get(&self, name: &str) -> Option<&CheckResult> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CheckResult)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks that did not pass, including those without data
    pub fn failures(&self) -> impl Iterator<Item = (&String, &CheckResult)> {
        self.0.iter().filter(|(_, result)| !result.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.0.values().filter(|result| result.passed).count()
    }
}

impl FromIterator<(String, CheckResult)> for CheckSet {
    fn from_iter<I: IntoIterator<Item = (String, CheckResult)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A named compliance or security check
#[async_trait]
pub trait Check: Send + Sync {
    /// Stable name used as the result key
    fn name(&self) -> &'static str;

    /// Fetch current state and compare it against the baseline.
    ///
    /// A collaborator error is returned as-is; the evaluator turns it into an
    /// unavailable result.
    async fn run(&self, sources: &ConfigurationSources, config: &AuditConfig) -> Result<CheckResult>;
}

/// Principals from `principals` that the baseline treats as low privilege
pub(crate) fn low_privilege<'a>(principals: &'a [String], config: &AuditConfig) -> Vec<&'a str> {
    principals
        .iter()
        .filter(|principal| config.baseline.is_low_privilege(principal))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_not_compliant() {
        let result = CheckResult::unavailable("registry read denied");
        assert!(!result.passed);
        assert!(!result.data_available);
        assert!(!result.is_finding());
        assert!(result.detail.starts_with("data unavailable"));
    }

    #[test]
    fn test_check_set_ordering_and_failures() {
        let mut set = CheckSet::new();
        set.insert("ESC8", CheckResult::pass("ok"));
        set.insert("ESC1", CheckResult::fail("bad", "fix it"));
        set.insert("ESC4", CheckResult::unavailable("down"));

        let names: Vec<_> = set.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["ESC1", "ESC4", "ESC8"]);
        assert_eq!(set.failures().count(), 2);
        assert_eq!(set.passed_count(), 1);
    }

    #[test]
    fn test_check_set_serializes_as_map() {
        let mut set = CheckSet::new();
        set.insert("AuditPolicy", CheckResult::pass("Audit filter is 127"));
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["AuditPolicy"]["passed"], true);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Security".parse::<CheckKind>().unwrap(), CheckKind::Security);
        assert!("network".parse::<CheckKind>().is_err());
    }

    #[test]
    fn test_low_privilege_filter() {
        let config = AuditConfig::default();
        let principals = vec![
            "CORP\\Domain Users".to_string(),
            "CORP\\PKI Admins".to_string(),
        ];
        assert_eq!(low_privilege(&principals, &config), vec!["CORP\\Domain Users"]);
    }
}
