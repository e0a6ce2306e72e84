// Infrastructure health snapshot types

pub mod prober;

use crate::sources::{CertStoreStatistics, ServiceRunState, StartType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use prober::HealthProber;

/// Whether a snapshot section could be collected at all
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum SectionStatus {
    #[default]
    Available,
    Unknown {
        detail: String,
    },
}

impl SectionStatus {
    pub fn unknown(detail: impl Into<String>) -> Self {
        SectionStatus::Unknown {
            detail: detail.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, SectionStatus::Available)
    }
}

/// Reachability of a certificate authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorityStatus {
    Online,
    Offline,
    Unknown,
}

impl std::fmt::Display for AuthorityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorityStatus::Online => write!(f, "Online"),
            AuthorityStatus::Offline => write!(f, "Offline"),
            AuthorityStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Health of one authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorityHealth {
    pub name: String,
    pub host: String,
    pub is_root: bool,
    pub status: AuthorityStatus,
    pub not_after: Option<DateTime<Utc>>,
    /// CA certificate expires inside the warning window (or already has)
    pub certificate_expiring: bool,
    pub template_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuthorityHealth {
    /// Placeholder used when the directory itself could not be read
    pub fn unknown(name: &str, is_root: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            host: String::new(),
            is_root,
            status: AuthorityStatus::Unknown,
            not_after: None,
            certificate_expiring: false,
            template_count: 0,
            detail: Some(detail.into()),
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == AuthorityStatus::Online
    }
}

/// Validity of an authority's current CRL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrlStatus {
    Valid,
    /// Still valid but inside the warning window before nextUpdate
    Expiring,
    Expired,
    Unknown,
}

impl std::fmt::Display for CrlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrlStatus::Valid => write!(f, "Valid"),
            CrlStatus::Expiring => write!(f, "Expiring"),
            CrlStatus::Expired => write!(f, "Expired"),
            CrlStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// CRL state for one authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrlHealth {
    pub authority: String,
    pub status: CrlStatus,
    pub this_update: Option<DateTime<Utc>>,
    pub next_update: Option<DateTime<Utc>>,
    pub hours_remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CrlHealth {
    /// nextUpdate is still in the future
    pub fn is_valid(&self) -> bool {
        matches!(self.status, CrlStatus::Valid | CrlStatus::Expiring)
    }
}

/// Liveness of one OCSP responder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderHealth {
    pub name: String,
    pub url: String,
    pub available: bool,
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// State of one monitored service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub name: String,
    pub status: ServiceRunState,
    pub start_type: StartType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceHealth {
    pub fn is_running(&self) -> bool {
        self.status == ServiceRunState::Running
    }
}

/// Point-in-time view of the PKI infrastructure. Not persisted by the core.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub captured_at: DateTime<Utc>,
    pub directory: SectionStatus,
    pub root_authority: Option<AuthorityHealth>,
    /// Roots beyond the first one the directory returned
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_roots: Vec<AuthorityHealth>,
    pub subordinate_authorities: Vec<AuthorityHealth>,
    pub revocation_lists: Vec<CrlHealth>,
    pub responders_section: SectionStatus,
    pub responders: Vec<ResponderHealth>,
    pub services: Vec<ServiceHealth>,
    pub cert_store_section: SectionStatus,
    pub cert_store: Option<CertStoreStatistics>,
}

impl HealthSnapshot {
    /// Every root authority in the snapshot
    pub fn roots(&self) -> impl Iterator<Item = &AuthorityHealth> {
        self.root_authority.iter().chain(self.additional_roots.iter())
    }

    /// Every authority, roots first
    pub fn authorities(&self) -> impl Iterator<Item = &AuthorityHealth> {
        self.roots().chain(self.subordinate_authorities.iter())
    }

    /// Sections that could not be collected, with their reason
    pub fn degraded_sections(&self) -> Vec<(&'static str, &str)> {
        [
            ("directory", &self.directory),
            ("responders", &self.responders_section),
            ("cert_store", &self.cert_store_section),
        ]
        .into_iter()
        .filter_map(|(name, section)| match section {
            SectionStatus::Unknown { detail } => Some((name, detail.as_str())),
            SectionStatus::Available => None,
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let snapshot = HealthSnapshot::default();
        assert!(snapshot.root_authority.is_none());
        assert_eq!(snapshot.authorities().count(), 0);
        assert!(snapshot.degraded_sections().is_empty());
    }

    #[test]
    fn test_degraded_sections() {
        let snapshot = HealthSnapshot {
            directory: SectionStatus::unknown("LDAP timeout"),
            ..Default::default()
        };
        assert_eq!(snapshot.degraded_sections(), vec![("directory", "LDAP timeout")]);
    }

    #[test]
    fn test_section_status_serialization() {
        let json = serde_json::to_string(&SectionStatus::unknown("down")).unwrap();
        assert!(json.contains("\"state\":\"Unknown\""));
        assert!(json.contains("down"));
    }

    #[test]
    fn test_crl_validity() {
        let mut crl = CrlHealth {
            authority: "Issuing CA".to_string(),
            status: CrlStatus::Expiring,
            this_update: None,
            next_update: None,
            hours_remaining: Some(3),
            detail: None,
        };
        assert!(crl.is_valid());
        crl.status = CrlStatus::Expired;
        assert!(!crl.is_valid());
    }
}
