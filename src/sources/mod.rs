// Data source interfaces
//
// The core never talks to LDAP, the CA database, the event log, the registry
// or the network itself. Each of those is a collaborator behind one of the
// traits below; concrete bindings live outside the core (see `inventory` for
// the file-backed one used by the CLI and the tests).

pub mod inventory;

use crate::Result;
use crate::error::PkiError;
use crate::events::RawEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use inventory::{Inventory, InventorySource};

/// A certificate authority as published in the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorityRef {
    pub name: String,
    pub host: String,
    pub is_root: bool,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    #[serde(default)]
    pub template_count: u32,
}

/// Publication window of an authority's current CRL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrlInfo {
    pub this_update: DateTime<Utc>,
    pub next_update: DateTime<Utc>,
}

/// An OCSP responder endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderRef {
    pub name: String,
    pub url: String,
}

/// Result of a single responder liveness request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderProbe {
    pub available: bool,
    pub elapsed_ms: u64,
}

/// Windows service run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceRunState {
    Running,
    Stopped,
    Paused,
    StartPending,
    StopPending,
    Unknown,
}

impl std::fmt::Display for ServiceRunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceRunState::Running => write!(f, "Running"),
            ServiceRunState::Stopped => write!(f, "Stopped"),
            ServiceRunState::Paused => write!(f, "Paused"),
            ServiceRunState::StartPending => write!(f, "Start Pending"),
            ServiceRunState::StopPending => write!(f, "Stop Pending"),
            ServiceRunState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Windows service start mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartType {
    Automatic,
    Manual,
    Disabled,
    Unknown,
}

/// State of one service as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    pub status: ServiceRunState,
    pub start_type: StartType,
}

/// Counters from the CA database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CertStoreStatistics {
    pub total_issued: u64,
    pub revoked: u64,
    pub pending_requests: u64,
    pub failed_requests: u64,
    /// Issued certificates expiring inside the warning window
    pub expiring_soon: u64,
}

/// CA policy-module registry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaPolicySettings {
    pub audit_filter: u32,
    pub edit_flags: u32,
    pub interface_flags: u32,
}

impl CaPolicySettings {
    /// EDITF_ATTRIBUTESUBJECTALTNAME2: requesters may supply a SAN in request attributes
    pub const EDITF_ATTRIBUTESUBJECTALTNAME2: u32 = 0x0004_0000;
    /// IF_ENFORCEENCRYPTICERTREQUEST: RPC enrollment must use packet privacy
    pub const IF_ENFORCEENCRYPTICERTREQUEST: u32 = 0x0000_0200;

    pub fn san_attribute_allowed(&self) -> bool {
        self.edit_flags & Self::EDITF_ATTRIBUTESUBJECTALTNAME2 != 0
    }

    pub fn rpc_encryption_enforced(&self) -> bool {
        self.interface_flags & Self::IF_ENFORCEENCRYPTICERTREQUEST != 0
    }
}

/// Rights a principal can hold on the CA object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaRight {
    ManageCa,
    ManageCertificates,
    Enroll,
    Read,
}

/// One ACE on the CA security descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaPermission {
    pub principal: String,
    pub rights: Vec<CaRight>,
}

/// SCHANNEL protocol toggle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSetting {
    pub name: String,
    pub enabled: bool,
}

/// Host hardening switches read from the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardeningState {
    pub smb_signing_required: bool,
    pub ldap_signing_required: bool,
    pub ntlmv1_disabled: bool,
    pub lm_hash_storage_disabled: bool,
    pub remote_registry_disabled: bool,
}

/// Certificate template as published in the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateTemplate {
    pub name: String,
    /// CT_FLAG_ENROLLEE_SUPPLIES_SUBJECT
    #[serde(default)]
    pub enrollee_supplies_subject: bool,
    /// Extended key usage OIDs; empty means "any purpose"
    #[serde(default)]
    pub ekus: Vec<String>,
    #[serde(default)]
    pub requires_manager_approval: bool,
    #[serde(default)]
    pub authorized_signatures: u32,
    #[serde(default)]
    pub enrollment_principals: Vec<String>,
    /// Principals with write/owner rights on the template object
    #[serde(default)]
    pub write_principals: Vec<String>,
    pub min_key_length: u32,
}

impl CertificateTemplate {
    pub const EKU_CLIENT_AUTH: &'static str = "1.3.6.1.5.5.7.3.2";
    pub const EKU_SMARTCARD_LOGON: &'static str = "1.3.6.1.4.1.311.20.2.2";
    pub const EKU_PKINIT_CLIENT: &'static str = "1.3.6.1.5.2.3.4";
    pub const EKU_ANY_PURPOSE: &'static str = "2.5.29.37.0";
    pub const EKU_REQUEST_AGENT: &'static str = "1.3.6.1.4.1.311.20.2.1";

    fn has_eku(&self, oid: &str) -> bool {
        self.ekus.iter().any(|e| e == oid)
    }

    /// Certificates from this template can authenticate to the domain
    pub fn allows_client_auth(&self) -> bool {
        self.has_eku(Self::EKU_CLIENT_AUTH)
            || self.has_eku(Self::EKU_SMARTCARD_LOGON)
            || self.has_eku(Self::EKU_PKINIT_CLIENT)
            || self.has_eku(Self::EKU_ANY_PURPOSE)
            || self.ekus.is_empty()
    }

    pub fn is_any_purpose(&self) -> bool {
        self.ekus.is_empty() || self.has_eku(Self::EKU_ANY_PURPOSE)
    }

    pub fn is_enrollment_agent(&self) -> bool {
        self.has_eku(Self::EKU_REQUEST_AGENT)
    }

    /// Issuance is gated by an approval or signature step
    pub fn has_issuance_gate(&self) -> bool {
        self.requires_manager_approval || self.authorized_signatures > 0
    }
}

/// HTTP(S) web-enrollment endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentEndpoint {
    pub url: String,
    /// Extended Protection for Authentication enabled on the IIS site
    #[serde(default)]
    pub epa_enabled: bool,
}

impl EnrollmentEndpoint {
    pub fn is_https(&self) -> bool {
        self.url.to_ascii_lowercase().starts_with("https://")
    }
}

/// Security audit event log
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        event_type_ids: &[u32],
    ) -> Result<Vec<RawEvent>>;
}

/// Directory view of the CA hierarchy
#[async_trait]
pub trait AuthorityDirectory: Send + Sync {
    async fn list_authorities(&self) -> Result<Vec<AuthorityRef>>;

    /// Lightweight reachability check of the CA's request interface
    async fn ping(&self, authority: &AuthorityRef) -> Result<bool>;
}

/// CRL distribution points
#[async_trait]
pub trait RevocationSource: Send + Sync {
    async fn get_crl(&self, authority: &AuthorityRef) -> Result<CrlInfo>;
}

/// OCSP responders
#[async_trait]
pub trait ResponderSource: Send + Sync {
    async fn list_responders(&self) -> Result<Vec<ResponderRef>>;

    async fn probe(&self, responder: &ResponderRef, timeout: Duration) -> Result<ResponderProbe>;
}

/// Host service control manager
#[async_trait]
pub trait ServiceSource: Send + Sync {
    async fn get_status(&self, service_name: &str) -> Result<ServiceState>;
}

/// CA database statistics
#[async_trait]
pub trait CertStoreSource: Send + Sync {
    async fn statistics(&self, expiring_within_days: i64) -> Result<CertStoreStatistics>;
}

/// CA policy-module settings and security descriptor
#[async_trait]
pub trait PolicySource: Send + Sync {
    async fn ca_policy(&self) -> Result<CaPolicySettings>;

    async fn ca_permissions(&self) -> Result<Vec<CaPermission>>;
}

/// Installed roles and features
#[async_trait]
pub trait FeatureSource: Send + Sync {
    async fn installed_features(&self) -> Result<Vec<String>>;
}

/// SCHANNEL protocol and cipher-suite configuration
#[async_trait]
pub trait ProtocolSource: Send + Sync {
    async fn protocols(&self) -> Result<Vec<ProtocolSetting>>;

    async fn cipher_suites(&self) -> Result<Vec<String>>;
}

/// Host hardening registry values
#[async_trait]
pub trait HardeningSource: Send + Sync {
    async fn hardening(&self) -> Result<HardeningState>;
}

/// Published templates and enrollment endpoints
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn templates(&self) -> Result<Vec<CertificateTemplate>>;

    async fn enrollment_endpoints(&self) -> Result<Vec<EnrollmentEndpoint>>;
}

/// Collaborators the health prober reads
#[derive(Clone)]
pub struct InfrastructureSources {
    pub directory: Arc<dyn AuthorityDirectory>,
    pub revocation: Arc<dyn RevocationSource>,
    pub responders: Arc<dyn ResponderSource>,
    pub services: Arc<dyn ServiceSource>,
    pub cert_store: Arc<dyn CertStoreSource>,
}

/// Collaborators the compliance and security checks read
#[derive(Clone)]
pub struct ConfigurationSources {
    pub policy: Arc<dyn PolicySource>,
    pub features: Arc<dyn FeatureSource>,
    pub protocols: Arc<dyn ProtocolSource>,
    pub hardening: Arc<dyn HardeningSource>,
    pub templates: Arc<dyn TemplateSource>,
}

/// Every collaborator one audit run needs
#[derive(Clone)]
pub struct Collaborators {
    pub events: Arc<dyn EventSource>,
    pub infrastructure: InfrastructureSources,
    pub configuration: ConfigurationSources,
}

impl Collaborators {
    /// Use one object that implements every source trait for all slots
    pub fn uniform<T>(source: Arc<T>) -> Self
    where
        T: EventSource
            + AuthorityDirectory
            + RevocationSource
            + ResponderSource
            + ServiceSource
            + CertStoreSource
            + PolicySource
            + FeatureSource
            + ProtocolSource
            + HardeningSource
            + TemplateSource
            + 'static,
    {
        Self {
            events: source.clone(),
            infrastructure: InfrastructureSources {
                directory: source.clone(),
                revocation: source.clone(),
                responders: source.clone(),
                services: source.clone(),
                cert_store: source.clone(),
            },
            configuration: ConfigurationSources {
                policy: source.clone(),
                features: source.clone(),
                protocols: source.clone(),
                hardening: source.clone(),
                templates: source,
            },
        }
    }
}

/// Run a collaborator call under a timeout.
///
/// An elapsed timeout becomes `PkiError::Timeout`, which callers treat the same
/// as an unreachable source.
pub async fn bounded<T, F>(operation: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(PkiError::Timeout {
            operation: operation.to_string(),
            duration: limit,
        }),
    }
}
