// Anomalies derived from CA and Kerberos audit events

pub mod detector;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub use detector::AnomalyDetector;

/// Kinds of anomaly the detector can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyKind {
    /// Certificate requests in one hour above the configured limit
    HighVolumeRequests,
    /// One user with more failed TGT requests than the configured limit
    KerberosFailureBurst,
    /// Certificate requests outside business hours
    OutOfHoursActivity,
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyKind::HighVolumeRequests => write!(f, "High Volume Requests"),
            AnomalyKind::KerberosFailureBurst => write!(f, "Kerberos Failure Burst"),
            AnomalyKind::OutOfHoursActivity => write!(f, "Out Of Hours Activity"),
        }
    }
}

/// Severity of an anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalySeverity::Low => write!(f, "Low"),
            AnomalySeverity::Medium => write!(f, "Medium"),
            AnomalySeverity::High => write!(f, "High"),
            AnomalySeverity::Critical => write!(f, "Critical"),
        }
    }
}

/// One offending request attached to an aggregate anomaly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySample {
    pub timestamp: DateTime<FixedOffset>,
    pub principal: String,
    pub template: String,
    pub source_host: String,
}

/// A finding produced by the detector. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    /// Hour bucket, user, or window the anomaly is about
    pub scope_key: String,
    pub count: usize,
    pub detail: String,
    pub severity: AnomalySeverity,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<AnomalySample>,
}

impl AnomalyKind {
    /// Fixed severity per kind
    pub fn severity(&self) -> AnomalySeverity {
        match self {
            AnomalyKind::HighVolumeRequests => AnomalySeverity::High,
            AnomalyKind::KerberosFailureBurst => AnomalySeverity::High,
            AnomalyKind::OutOfHoursActivity => AnomalySeverity::Medium,
        }
    }
}
