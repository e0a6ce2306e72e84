// Infrastructure health prober
//
// Reads the authority directory, CRLs, OCSP responders, services and the CA
// database through the collaborator traits and folds everything into one
// HealthSnapshot. Every call is bounded by the configured timeout; a failed or
// timed-out call degrades its own slot and never aborts the probe.

use super::{
    AuthorityHealth, AuthorityStatus, CrlHealth, CrlStatus, HealthSnapshot, ResponderHealth,
    SectionStatus, ServiceHealth,
};
use crate::config::AuditConfig;
use crate::sources::{
    AuthorityRef, CertStoreStatistics, InfrastructureSources, ResponderRef, ServiceRunState,
    StartType, bounded,
};
use crate::utils::Limiter;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name given to the root placeholder when the directory cannot be read
const UNKNOWN_ROOT: &str = "Root CA";

/// Authority section of a snapshot
struct AuthoritySection {
    directory: SectionStatus,
    root: Option<AuthorityHealth>,
    additional_roots: Vec<AuthorityHealth>,
    subordinates: Vec<AuthorityHealth>,
    revocation_lists: Vec<CrlHealth>,
}

/// Probes infrastructure collaborators into a `HealthSnapshot`
pub struct HealthProber {
    sources: InfrastructureSources,
    limiter: Option<Limiter>,
}

impl HealthProber {
    pub fn new(sources: InfrastructureSources) -> Self {
        Self {
            sources,
            limiter: None,
        }
    }

    /// Draw per-item probe permits from a limiter shared with other work.
    /// Without one, each probe run gets its own `probe.parallelism` limit.
    pub fn with_limiter(mut self, limiter: Limiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Probe everything, using the current time for validity calculations
    pub async fn probe(&self, config: &AuditConfig) -> HealthSnapshot {
        self.probe_at(config, Utc::now()).await
    }

    /// Probe everything relative to `now`. Always returns a snapshot.
    pub async fn probe_at(&self, config: &AuditConfig, now: DateTime<Utc>) -> HealthSnapshot {
        info!("Probing PKI infrastructure");
        let limiter = self
            .limiter
            .clone()
            .unwrap_or_else(|| Limiter::new(config.probe.parallelism));

        let (authorities, (responders_section, responders), services, (cert_store_section, cert_store)) = tokio::join!(
            self.probe_authorities(config, &limiter, now),
            self.probe_responders(config, &limiter),
            self.probe_services(config, &limiter),
            self.probe_cert_store(config),
        );

        let snapshot = HealthSnapshot {
            captured_at: now,
            directory: authorities.directory,
            root_authority: authorities.root,
            additional_roots: authorities.additional_roots,
            subordinate_authorities: authorities.subordinates,
            revocation_lists: authorities.revocation_lists,
            responders_section,
            responders,
            services,
            cert_store_section,
            cert_store,
        };

        for (section, detail) in snapshot.degraded_sections() {
            warn!("Health section '{}' unavailable: {}", section, detail);
        }

        snapshot
    }

    async fn probe_authorities(
        &self,
        config: &AuditConfig,
        limiter: &Limiter,
        now: DateTime<Utc>,
    ) -> AuthoritySection {
        let timeout = config.probe.timeout();

        let authorities = match bounded(
            "list authorities",
            timeout,
            self.sources.directory.list_authorities(),
        )
        .await
        {
            Ok(authorities) => authorities,
            Err(e) => {
                warn!("Authority directory unavailable: {}", e);
                let detail = format!("directory unavailable: {}", e);
                return AuthoritySection {
                    directory: SectionStatus::unknown(detail.clone()),
                    root: Some(AuthorityHealth::unknown(UNKNOWN_ROOT, true, detail)),
                    additional_roots: Vec::new(),
                    subordinates: Vec::new(),
                    revocation_lists: Vec::new(),
                };
            }
        };

        debug!("Directory returned {} authorities", authorities.len());

        let probed = limiter
            .join(
                authorities
                    .iter()
                    .map(|authority| self.probe_authority(authority, config, now, timeout)),
            )
            .await;

        let mut section = AuthoritySection {
            directory: SectionStatus::Available,
            root: None,
            additional_roots: Vec::new(),
            subordinates: Vec::new(),
            revocation_lists: Vec::with_capacity(probed.len()),
        };

        for (health, crl) in probed {
            section.revocation_lists.push(crl);
            if !health.is_root {
                section.subordinates.push(health);
            } else if section.root.is_none() {
                section.root = Some(health);
            } else {
                section.additional_roots.push(health);
            }
        }

        if section.root.is_none() && !section.subordinates.is_empty() {
            warn!("Directory lists no root authority");
        }

        section
    }

    async fn probe_authority(
        &self,
        authority: &AuthorityRef,
        config: &AuditConfig,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> (AuthorityHealth, CrlHealth) {
        let ping_op = format!("ping {}", authority.name);
        let crl_op = format!("CRL for {}", authority.name);

        let (ping, crl) = tokio::join!(
            bounded(&ping_op, timeout, self.sources.directory.ping(authority)),
            bounded(&crl_op, timeout, self.sources.revocation.get_crl(authority)),
        );

        let (status, detail) = match ping {
            Ok(true) => (AuthorityStatus::Online, None),
            Ok(false) => (AuthorityStatus::Offline, Some("CA did not answer".to_string())),
            Err(e) => {
                warn!("Could not reach authority {}: {}", authority.name, e);
                (AuthorityStatus::Unknown, Some(e.to_string()))
            }
        };

        let certificate_expiring = match config.thresholds.expiration_warning() {
            Ok(window) => authority.not_after.signed_duration_since(now) <= window,
            Err(e) => {
                warn!("Expiry of {} not evaluated: {}", authority.name, e);
                false
            }
        };
        let health = AuthorityHealth {
            name: authority.name.clone(),
            host: authority.host.clone(),
            is_root: authority.is_root,
            status,
            not_after: Some(authority.not_after),
            certificate_expiring,
            template_count: authority.template_count,
            detail,
        };

        let crl = match crl {
            Ok(info) => {
                let hours_remaining = (info.next_update - now).num_hours();
                let status = if info.next_update <= now {
                    CrlStatus::Expired
                } else if hours_remaining < config.thresholds.crl_warning_hours {
                    CrlStatus::Expiring
                } else {
                    CrlStatus::Valid
                };
                CrlHealth {
                    authority: authority.name.clone(),
                    status,
                    this_update: Some(info.this_update),
                    next_update: Some(info.next_update),
                    hours_remaining: Some(hours_remaining),
                    detail: None,
                }
            }
            Err(e) => {
                warn!("CRL for {} unavailable: {}", authority.name, e);
                CrlHealth {
                    authority: authority.name.clone(),
                    status: CrlStatus::Unknown,
                    this_update: None,
                    next_update: None,
                    hours_remaining: None,
                    detail: Some(e.to_string()),
                }
            }
        };

        (health, crl)
    }

    async fn probe_responders(
        &self,
        config: &AuditConfig,
        limiter: &Limiter,
    ) -> (SectionStatus, Vec<ResponderHealth>) {
        let timeout = config.probe.timeout();

        let responders =
            match bounded("list responders", timeout, self.sources.responders.list_responders())
                .await
            {
                Ok(responders) => responders,
                Err(e) => {
                    warn!("Responder list unavailable: {}", e);
                    return (SectionStatus::unknown(e.to_string()), Vec::new());
                }
            };

        let results = limiter
            .join(
                responders
                    .iter()
                    .map(|responder| self.probe_responder(responder, timeout)),
            )
            .await;

        (SectionStatus::Available, results)
    }

    async fn probe_responder(&self, responder: &ResponderRef, timeout: Duration) -> ResponderHealth {
        let operation = format!("probe {}", responder.url);
        match bounded(&operation, timeout, self.sources.responders.probe(responder, timeout)).await {
            Ok(probe) => ResponderHealth {
                name: responder.name.clone(),
                url: responder.url.clone(),
                available: probe.available,
                elapsed_ms: Some(probe.elapsed_ms),
                error: (!probe.available).then(|| "responder returned no valid answer".to_string()),
            },
            Err(e) => {
                debug!("Responder {} unavailable: {}", responder.name, e);
                ResponderHealth {
                    name: responder.name.clone(),
                    url: responder.url.clone(),
                    available: false,
                    elapsed_ms: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn probe_services(&self, config: &AuditConfig, limiter: &Limiter) -> Vec<ServiceHealth> {
        let timeout = config.probe.timeout();
        limiter.join(
            config.baseline.monitored_services.iter().map(|name| async move {
                let operation = format!("service {}", name);
                match bounded(&operation, timeout, self.sources.services.get_status(name)).await {
                    Ok(state) => ServiceHealth {
                        name: name.clone(),
                        status: state.status,
                        start_type: state.start_type,
                        error: None,
                    },
                    Err(e) => ServiceHealth {
                        name: name.clone(),
                        status: ServiceRunState::Unknown,
                        start_type: StartType::Unknown,
                        error: Some(e.to_string()),
                    },
                }
            }),
        )
        .await
    }

    async fn probe_cert_store(
        &self,
        config: &AuditConfig,
    ) -> (SectionStatus, Option<CertStoreStatistics>) {
        match bounded(
            "certificate store statistics",
            config.probe.timeout(),
            self.sources
                .cert_store
                .statistics(config.thresholds.cert_expiration_warning_days),
        )
        .await
        {
            Ok(stats) => (SectionStatus::Available, Some(stats)),
            Err(e) => (SectionStatus::unknown(e.to_string()), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::error::PkiError;
    use crate::sources::{
        AuthorityDirectory, CertStoreSource, CrlInfo, ResponderProbe, ResponderSource,
        RevocationSource, ServiceSource, ServiceState,
    };
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn authority(name: &str, is_root: bool) -> AuthorityRef {
        AuthorityRef {
            name: name.to_string(),
            host: format!("{}.corp.local", name.to_lowercase()),
            is_root,
            not_before: now() - ChronoDuration::days(365),
            not_after: now() + ChronoDuration::days(3650),
            template_count: if is_root { 0 } else { 12 },
        }
    }

    struct FakeInfra {
        authorities: Option<Vec<AuthorityRef>>,
        offline: Vec<String>,
        crl_next_update: ChronoDuration,
        responders: Vec<ResponderRef>,
        hanging_responder: Option<String>,
    }

    impl Default for FakeInfra {
        fn default() -> Self {
            Self {
                authorities: Some(vec![authority("RootCA", true), authority("IssuingCA", false)]),
                offline: vec![],
                crl_next_update: ChronoDuration::days(5),
                responders: vec![],
                hanging_responder: None,
            }
        }
    }

    #[async_trait]
    impl AuthorityDirectory for FakeInfra {
        async fn list_authorities(&self) -> Result<Vec<AuthorityRef>> {
            self.authorities
                .clone()
                .ok_or_else(|| PkiError::unavailable("directory", "LDAP bind failed"))
        }

        async fn ping(&self, authority: &AuthorityRef) -> Result<bool> {
            Ok(!self.offline.contains(&authority.name))
        }
    }

    #[async_trait]
    impl RevocationSource for FakeInfra {
        async fn get_crl(&self, _authority: &AuthorityRef) -> Result<CrlInfo> {
            Ok(CrlInfo {
                this_update: now() - ChronoDuration::days(1),
                next_update: now() + self.crl_next_update,
            })
        }
    }

    #[async_trait]
    impl ResponderSource for FakeInfra {
        async fn list_responders(&self) -> Result<Vec<ResponderRef>> {
            Ok(self.responders.clone())
        }

        async fn probe(&self, responder: &ResponderRef, _timeout: Duration) -> Result<ResponderProbe> {
            if self.hanging_responder.as_deref() == Some(responder.name.as_str()) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(ResponderProbe {
                available: true,
                elapsed_ms: 12,
            })
        }
    }

    #[async_trait]
    impl ServiceSource for FakeInfra {
        async fn get_status(&self, service_name: &str) -> Result<ServiceState> {
            if service_name == "OcspSvc" {
                return Err(PkiError::unavailable("services", "access denied"));
            }
            Ok(ServiceState {
                status: ServiceRunState::Running,
                start_type: StartType::Automatic,
            })
        }
    }

    #[async_trait]
    impl CertStoreSource for FakeInfra {
        async fn statistics(&self, _expiring_within_days: i64) -> Result<CertStoreStatistics> {
            Ok(CertStoreStatistics {
                total_issued: 120,
                revoked: 4,
                ..Default::default()
            })
        }
    }

    fn prober(fake: FakeInfra) -> HealthProber {
        let fake = Arc::new(fake);
        HealthProber::new(InfrastructureSources {
            directory: fake.clone(),
            revocation: fake.clone(),
            responders: fake.clone(),
            services: fake.clone(),
            cert_store: fake,
        })
    }

    fn fast_config() -> AuditConfig {
        let mut config = AuditConfig::default();
        config.probe.timeout_ms = 100;
        config
    }

    #[tokio::test]
    async fn test_classifies_root_and_subordinates() {
        let snapshot = prober(FakeInfra::default())
            .probe_at(&fast_config(), now())
            .await;

        let root = snapshot.root_authority.as_ref().unwrap();
        assert_eq!(root.name, "RootCA");
        assert!(root.is_online());
        assert_eq!(snapshot.subordinate_authorities.len(), 1);
        assert_eq!(snapshot.subordinate_authorities[0].template_count, 12);
        assert_eq!(snapshot.revocation_lists.len(), 2);
        assert!(snapshot.revocation_lists.iter().all(|c| c.status == CrlStatus::Valid));
        assert_eq!(snapshot.cert_store.unwrap().total_issued, 120);
    }

    #[tokio::test]
    async fn test_offline_subordinate() {
        let fake = FakeInfra {
            offline: vec!["IssuingCA".to_string()],
            ..Default::default()
        };
        let snapshot = prober(fake).probe_at(&fast_config(), now()).await;

        assert_eq!(
            snapshot.subordinate_authorities[0].status,
            AuthorityStatus::Offline
        );
    }

    #[tokio::test]
    async fn test_directory_unavailable_yields_unknown_root() {
        let fake = FakeInfra {
            authorities: None,
            ..Default::default()
        };
        let snapshot = prober(fake).probe_at(&fast_config(), now()).await;

        assert!(!snapshot.directory.is_available());
        let root = snapshot.root_authority.unwrap();
        assert_eq!(root.status, AuthorityStatus::Unknown);
        assert!(root.detail.unwrap().contains("LDAP bind failed"));
        // Other sections are still collected
        assert!(snapshot.cert_store.is_some());
    }

    #[tokio::test]
    async fn test_crl_states() {
        let expired = FakeInfra {
            crl_next_update: ChronoDuration::hours(-2),
            ..Default::default()
        };
        let snapshot = prober(expired).probe_at(&fast_config(), now()).await;
        assert!(snapshot.revocation_lists.iter().all(|c| c.status == CrlStatus::Expired));
        assert!(snapshot.revocation_lists.iter().all(|c| !c.is_valid()));

        let expiring = FakeInfra {
            crl_next_update: ChronoDuration::hours(6),
            ..Default::default()
        };
        let snapshot = prober(expiring).probe_at(&fast_config(), now()).await;
        assert!(snapshot.revocation_lists.iter().all(|c| c.status == CrlStatus::Expiring));
        assert_eq!(snapshot.revocation_lists[0].hours_remaining, Some(6));
    }

    #[tokio::test]
    async fn test_timed_out_responder_only_degrades_itself() {
        let responders = ["ocsp1", "ocsp2", "ocsp3"]
            .iter()
            .map(|name| ResponderRef {
                name: name.to_string(),
                url: format!("http://{}.corp.local/ocsp", name),
            })
            .collect();
        let fake = FakeInfra {
            responders,
            hanging_responder: Some("ocsp2".to_string()),
            ..Default::default()
        };

        let snapshot = prober(fake).probe_at(&fast_config(), now()).await;

        assert_eq!(snapshot.responders.len(), 3);
        assert!(snapshot.responders[0].available);
        assert!(!snapshot.responders[1].available);
        assert!(snapshot.responders[1].error.as_ref().unwrap().contains("timed out"));
        assert!(snapshot.responders[2].available);
    }

    #[tokio::test]
    async fn test_service_failure_recorded_as_unknown() {
        let snapshot = prober(FakeInfra::default())
            .probe_at(&fast_config(), now())
            .await;

        assert_eq!(snapshot.services.len(), 3);
        let ocsp = snapshot.services.iter().find(|s| s.name == "OcspSvc").unwrap();
        assert_eq!(ocsp.status, ServiceRunState::Unknown);
        assert!(ocsp.error.is_some());
        assert!(snapshot.services.iter().filter(|s| s.is_running()).count() == 2);
    }

    #[tokio::test]
    async fn test_expiring_authority_certificate_flagged() {
        let mut root = authority("RootCA", true);
        root.not_after = now() + ChronoDuration::days(10);
        let fake = FakeInfra {
            authorities: Some(vec![root]),
            ..Default::default()
        };

        let snapshot = prober(fake).probe_at(&fast_config(), now()).await;
        assert!(snapshot.root_authority.unwrap().certificate_expiring);
    }

    #[tokio::test]
    async fn test_out_of_range_expiry_window_does_not_abort_probe() {
        let mut config = fast_config();
        config.thresholds.cert_expiration_warning_days = i64::MAX / 2;
        let fake = FakeInfra {
            authorities: Some(vec![authority("RootCA", true)]),
            ..Default::default()
        };

        let snapshot = prober(fake).probe_at(&config, now()).await;
        let root = snapshot.root_authority.unwrap();
        assert!(!root.certificate_expiring);
        assert!(root.is_online());
    }
}
