// Inventory Source - file-backed binding for every collaborator trait
//
// A single JSON document captured from the PKI estate (or hand-written for
// tests). Every section is optional; a missing section makes the matching
// collaborator report itself unavailable instead of returning empty data.
//
// ```json
// {
//   "authorities": [{ "name": "Corp Root", "host": "ca00", "is_root": true,
//                     "not_before": "...", "not_after": "...", "online": true,
//                     "crl": { "this_update": "...", "next_update": "..." } }],
//   "responders": [{ "name": "ocsp01", "url": "http://ocsp01/ocsp",
//                    "available": true, "elapsed_ms": 40 }],
//   "services": { "CertSvc": { "status": "Running", "start_type": "Automatic" } },
//   "events": [ ... RawEvent ... ]
// }
// ```

use super::{
    AuthorityDirectory, AuthorityRef, CaPermission, CaPolicySettings, CertStoreSource,
    CertStoreStatistics, CertificateTemplate, CrlInfo, EnrollmentEndpoint, EventSource,
    FeatureSource, HardeningSource, HardeningState, PolicySource, ProtocolSetting,
    ProtocolSource, ResponderProbe, ResponderRef, ResponderSource, RevocationSource,
    ServiceSource, ServiceState, TemplateSource,
};
use crate::Result;
use crate::error::PkiError;
use crate::events::RawEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Authority entry with its recorded reachability and CRL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryAuthority {
    #[serde(flatten)]
    pub authority: AuthorityRef,
    #[serde(default = "default_true")]
    pub online: bool,
    #[serde(default)]
    pub crl: Option<CrlInfo>,
}

/// Responder entry with its recorded probe outcome.
///
/// `elapsed_ms` above the caller's timeout is reported as a timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryResponder {
    #[serde(flatten)]
    pub responder: ResponderRef,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub elapsed_ms: u64,
}

fn default_true() -> bool {
    true
}

/// Captured state of a PKI deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub events: Option<Vec<RawEvent>>,
    #[serde(default)]
    pub authorities: Option<Vec<InventoryAuthority>>,
    #[serde(default)]
    pub responders: Option<Vec<InventoryResponder>>,
    #[serde(default)]
    pub services: Option<BTreeMap<String, ServiceState>>,
    #[serde(default)]
    pub cert_store: Option<CertStoreStatistics>,
    #[serde(default)]
    pub policy: Option<CaPolicySettings>,
    #[serde(default)]
    pub permissions: Option<Vec<CaPermission>>,
    #[serde(default)]
    pub features: Option<Vec<String>>,
    #[serde(default)]
    pub protocols: Option<Vec<ProtocolSetting>>,
    #[serde(default)]
    pub cipher_suites: Option<Vec<String>>,
    #[serde(default)]
    pub hardening: Option<HardeningState>,
    #[serde(default)]
    pub templates: Option<Vec<CertificateTemplate>>,
    #[serde(default)]
    pub enrollment_endpoints: Option<Vec<EnrollmentEndpoint>>,
}

/// Serves an `Inventory` through the collaborator traits
#[derive(Debug, Clone, Default)]
pub struct InventorySource {
    inventory: Inventory,
}

impl InventorySource {
    pub fn new(inventory: Inventory) -> Self {
        Self { inventory }
    }

    /// Load an inventory from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| PkiError::FileSystem {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let inventory: Inventory = serde_json::from_str(contents)?;
        Ok(Self::new(inventory))
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    fn section<'a, T>(section: &'a Option<T>, source_name: &str) -> Result<&'a T> {
        section
            .as_ref()
            .ok_or_else(|| PkiError::unavailable(source_name, "section missing from inventory"))
    }

    fn authority(&self, authority: &AuthorityRef) -> Result<&InventoryAuthority> {
        Self::section(&self.inventory.authorities, "AuthorityDirectory")?
            .iter()
            .find(|a| a.authority.name == authority.name)
            .ok_or_else(|| {
                PkiError::unavailable(
                    "AuthorityDirectory",
                    format!("authority '{}' not in inventory", authority.name),
                )
            })
    }
}

#[async_trait]
impl EventSource for InventorySource {
    async fn query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        event_type_ids: &[u32],
    ) -> Result<Vec<RawEvent>> {
        let events = Self::section(&self.inventory.events, "EventSource")?;

        Ok(events
            .iter()
            .filter(|e| {
                let ts = e.timestamp.with_timezone(&Utc);
                ts >= start && ts < end && event_type_ids.contains(&e.event_type_id)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AuthorityDirectory for InventorySource {
    async fn list_authorities(&self) -> Result<Vec<AuthorityRef>> {
        Ok(Self::section(&self.inventory.authorities, "AuthorityDirectory")?
            .iter()
            .map(|a| a.authority.clone())
            .collect())
    }

    async fn ping(&self, authority: &AuthorityRef) -> Result<bool> {
        Ok(self.authority(authority)?.online)
    }
}

#[async_trait]
impl RevocationSource for InventorySource {
    async fn get_crl(&self, authority: &AuthorityRef) -> Result<CrlInfo> {
        self.authority(authority)?.crl.ok_or_else(|| {
            PkiError::unavailable(
                "RevocationSource",
                format!("no CRL recorded for '{}'", authority.name),
            )
        })
    }
}

#[async_trait]
impl ResponderSource for InventorySource {
    async fn list_responders(&self) -> Result<Vec<ResponderRef>> {
        Ok(Self::section(&self.inventory.responders, "ResponderSource")?
            .iter()
            .map(|r| r.responder.clone())
            .collect())
    }

    async fn probe(&self, responder: &ResponderRef, timeout: Duration) -> Result<ResponderProbe> {
        let entry = Self::section(&self.inventory.responders, "ResponderSource")?
            .iter()
            .find(|r| r.responder.name == responder.name)
            .ok_or_else(|| {
                PkiError::unavailable(
                    "ResponderSource",
                    format!("responder '{}' not in inventory", responder.name),
                )
            })?;

        if Duration::from_millis(entry.elapsed_ms) > timeout {
            return Err(PkiError::Timeout {
                operation: format!("probe of responder '{}'", responder.name),
                duration: timeout,
            });
        }

        Ok(ResponderProbe {
            available: entry.available,
            elapsed_ms: entry.elapsed_ms,
        })
    }
}

#[async_trait]
impl ServiceSource for InventorySource {
    async fn get_status(&self, service_name: &str) -> Result<ServiceState> {
        Self::section(&self.inventory.services, "ServiceSource")?
            .get(service_name)
            .copied()
            .ok_or_else(|| {
                PkiError::unavailable(
                    "ServiceSource",
                    format!("service '{}' not in inventory", service_name),
                )
            })
    }
}

#[async_trait]
impl CertStoreSource for InventorySource {
    async fn statistics(&self, _expiring_within_days: i64) -> Result<CertStoreStatistics> {
        Self::section(&self.inventory.cert_store, "CertStoreSource").copied()
    }
}

#[async_trait]
impl PolicySource for InventorySource {
    async fn ca_policy(&self) -> Result<CaPolicySettings> {
        Self::section(&self.inventory.policy, "PolicySource").copied()
    }

    async fn ca_permissions(&self) -> Result<Vec<CaPermission>> {
        Self::section(&self.inventory.permissions, "PolicySource").cloned()
    }
}

#[async_trait]
impl FeatureSource for InventorySource {
    async fn installed_features(&self) -> Result<Vec<String>> {
        Self::section(&self.inventory.features, "FeatureSource").cloned()
    }
}

#[async_trait]
impl ProtocolSource for InventorySource {
    async fn protocols(&self) -> Result<Vec<ProtocolSetting>> {
        Self::section(&self.inventory.protocols, "ProtocolSource").cloned()
    }

    async fn cipher_suites(&self) -> Result<Vec<String>> {
        Self::section(&self.inventory.cipher_suites, "ProtocolSource").cloned()
    }
}

#[async_trait]
impl HardeningSource for InventorySource {
    async fn hardening(&self) -> Result<HardeningState> {
        Self::section(&self.inventory.hardening, "HardeningSource").copied()
    }
}

#[async_trait]
impl TemplateSource for InventorySource {
    async fn templates(&self) -> Result<Vec<CertificateTemplate>> {
        Self::section(&self.inventory.templates, "TemplateSource").cloned()
    }

    async fn enrollment_endpoints(&self) -> Result<Vec<EnrollmentEndpoint>> {
        Self::section(&self.inventory.enrollment_endpoints, "TemplateSource").cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVENTORY: &str = r#"{
        "authorities": [
            {
                "name": "Corp Root CA",
                "host": "ca00.corp.local",
                "is_root": true,
                "not_before": "2020-01-01T00:00:00Z",
                "not_after": "2040-01-01T00:00:00Z",
                "online": true,
                "crl": {
                    "this_update": "2025-03-01T00:00:00Z",
                    "next_update": "2025-03-08T00:00:00Z"
                }
            }
        ],
        "responders": [
            { "name": "ocsp01", "url": "http://ocsp01/ocsp", "available": true, "elapsed_ms": 30 },
            { "name": "ocsp02", "url": "http://ocsp02/ocsp", "elapsed_ms": 9000 }
        ],
        "services": {
            "CertSvc": { "status": "Running", "start_type": "Automatic" }
        },
        "events": [
            {
                "timestamp": "2025-03-04T10:00:00+00:00",
                "event_type_id": 4886,
                "source_host": "ca01",
                "principal_id": "S-1-5-21-1",
                "field_values": ["1", "CORP\\alice", "User", "Pending"]
            },
            {
                "timestamp": "2025-03-06T10:00:00+00:00",
                "event_type_id": 4886,
                "source_host": "ca01",
                "principal_id": "S-1-5-21-1",
                "field_values": ["2", "CORP\\bob", "User", "Pending"]
            }
        ]
    }"#;

    #[test]
    fn test_unreadable_file_names_path() {
        let err = InventorySource::from_file("/nonexistent/estate.json").unwrap_err();
        match err {
            PkiError::FileSystem { path, .. } => assert_eq!(path, "/nonexistent/estate.json"),
            other => panic!("expected FileSystem error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_authorities_and_crl() {
        let source = InventorySource::from_json(INVENTORY).unwrap();
        let authorities = source.list_authorities().await.unwrap();
        assert_eq!(authorities.len(), 1);
        assert!(authorities[0].is_root);
        assert!(source.ping(&authorities[0]).await.unwrap());
        assert!(source.get_crl(&authorities[0]).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_section_is_unavailable() {
        let source = InventorySource::from_json(INVENTORY).unwrap();
        let err = source.ca_policy().await.unwrap_err();
        assert!(matches!(err, PkiError::SourceUnavailable { .. }));
        assert!(source.templates().await.is_err());
    }

    #[tokio::test]
    async fn test_responder_timeout() {
        let source = InventorySource::from_json(INVENTORY).unwrap();
        let responders = source.list_responders().await.unwrap();

        let fast = source
            .probe(&responders[0], Duration::from_secs(5))
            .await
            .unwrap();
        assert!(fast.available);

        let slow = source.probe(&responders[1], Duration::from_secs(5)).await;
        assert!(matches!(slow, Err(PkiError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_event_window_filter() {
        let source = InventorySource::from_json(INVENTORY).unwrap();
        let start = DateTime::parse_from_rfc3339("2025-03-04T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let end = DateTime::parse_from_rfc3339("2025-03-05T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let events = source.query(start, end, &[4886]).await.unwrap();
        assert_eq!(events.len(), 1);

        let none = source.query(start, end, &[4768]).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let source = InventorySource::from_json(INVENTORY).unwrap();
        assert!(source.get_status("CertSvc").await.is_ok());
        assert!(source.get_status("OcspSvc").await.is_err());
    }
}
