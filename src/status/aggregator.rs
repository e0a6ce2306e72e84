// Status aggregator - folds health, compliance and security findings into one status
//
// Rules are evaluated independently in a fixed order; each triggering item
// contributes one severity and one recommendation line. The overall status is
// the maximum triggered severity, or Healthy when nothing triggers.

use super::OverallStatus;
use crate::checks::CheckSet;
use crate::health::{CrlStatus, HealthSnapshot, SectionStatus};
use serde::{Deserialize, Serialize};

/// Overall status plus recommendations in rule-evaluation order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusSummary {
    pub overall: OverallStatus,
    pub recommendations: Vec<String>,
}

/// Accumulates triggered rules
#[derive(Default)]
struct Findings {
    overall: OverallStatus,
    recommendations: Vec<String>,
}

impl Findings {
    fn raise(&mut self, severity: OverallStatus, recommendation: String) {
        self.overall = self.overall.max(severity);
        self.recommendations.push(recommendation);
    }
}

/// Combines the outputs of the prober and the evaluator
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusAggregator;

impl StatusAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn aggregate(
        &self,
        infrastructure: &HealthSnapshot,
        compliance: &CheckSet,
        security: &CheckSet,
    ) -> StatusSummary {
        let mut findings = Findings::default();

        // Root authorities not online
        for root in infrastructure.roots().filter(|a| !a.is_online()) {
            findings.raise(
                OverallStatus::Critical,
                format!(
                    "Root CA '{}' is {}: restore the root authority immediately{}",
                    root.name,
                    root.status,
                    suffix(root.detail.as_deref())
                ),
            );
        }

        // Subordinate authorities not online
        for sub in infrastructure
            .subordinate_authorities
            .iter()
            .filter(|a| !a.is_online())
        {
            findings.raise(
                OverallStatus::Error,
                format!(
                    "Subordinate CA '{}' on {} is {}: check the CertSvc service and network reachability{}",
                    sub.name,
                    sub.host,
                    sub.status,
                    suffix(sub.detail.as_deref())
                ),
            );
        }

        // Failing compliance checks, including those without data
        for (name, result) in compliance.failures() {
            let line = result.recommendation.as_deref().unwrap_or(&result.detail);
            findings.raise(OverallStatus::Warning, format!("[{}] {}", name, line));
        }

        // Security vulnerability findings
        for (name, result) in security.iter().filter(|(_, r)| r.is_finding()) {
            let remediation = result
                .recommendation
                .as_deref()
                .map(|r| format!(" Remediation: {}", r))
                .unwrap_or_default();
            findings.raise(
                OverallStatus::Critical,
                format!("[{}] Vulnerability: {}.{}", name, result.detail, remediation),
            );
        }

        // Subordinates listed without any root to chain to
        if infrastructure.roots().next().is_none()
            && !infrastructure.subordinate_authorities.is_empty()
        {
            findings.raise(
                OverallStatus::Error,
                format!(
                    "Directory lists {} subordinate CA(s) but no root CA: verify the root authority is published in the directory",
                    infrastructure.subordinate_authorities.len()
                ),
            );
        }

        // Revocation lists
        for crl in &infrastructure.revocation_lists {
            match crl.status {
                CrlStatus::Expired => findings.raise(
                    OverallStatus::Error,
                    format!("CRL for '{}' has expired: publish a new CRL", crl.authority),
                ),
                CrlStatus::Unknown => findings.raise(
                    OverallStatus::Error,
                    format!(
                        "CRL for '{}' could not be read{}",
                        crl.authority,
                        suffix(crl.detail.as_deref())
                    ),
                ),
                CrlStatus::Expiring => findings.raise(
                    OverallStatus::Warning,
                    format!(
                        "CRL for '{}' expires in {} hours: verify CRL publication is scheduled",
                        crl.authority,
                        crl.hours_remaining.unwrap_or(0)
                    ),
                ),
                CrlStatus::Valid => {}
            }
        }

        // OCSP responders
        if let SectionStatus::Unknown { detail } = &infrastructure.responders_section {
            findings.raise(
                OverallStatus::Warning,
                format!("OCSP responder list unavailable: {}", detail),
            );
        }
        for responder in infrastructure.responders.iter().filter(|r| !r.available) {
            findings.raise(
                OverallStatus::Warning,
                format!(
                    "OCSP responder '{}' ({}) is unavailable{}",
                    responder.name,
                    responder.url,
                    suffix(responder.error.as_deref())
                ),
            );
        }

        // Monitored services
        for service in infrastructure.services.iter().filter(|s| !s.is_running()) {
            findings.raise(
                OverallStatus::Warning,
                format!(
                    "Service '{}' is {}: start it and check its start type ({:?}){}",
                    service.name,
                    service.status,
                    service.start_type,
                    suffix(service.error.as_deref())
                ),
            );
        }

        // Authority certificates close to expiry
        for authority in infrastructure
            .authorities()
            .filter(|a| a.certificate_expiring)
        {
            let when = authority
                .not_after
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            findings.raise(
                OverallStatus::Warning,
                format!(
                    "CA certificate of '{}' expires on {}: plan renewal",
                    authority.name, when
                ),
            );
        }

        // Certificate store statistics
        if let SectionStatus::Unknown { detail } = &infrastructure.cert_store_section {
            findings.raise(
                OverallStatus::Warning,
                format!("Certificate store statistics unavailable: {}", detail),
            );
        }

        // Security checks that could not run
        for (name, result) in security
            .iter()
            .filter(|(_, r)| !r.passed && !r.data_available)
        {
            findings.raise(
                OverallStatus::Warning,
                format!("[{}] could not be evaluated: {}", name, result.detail),
            );
        }

        StatusSummary {
            overall: findings.overall,
            recommendations: findings.recommendations,
        }
    }
}

fn suffix(detail: Option<&str>) -> String {
    detail.map(|d| format!(" ({})", d)).unwrap_or_default()
}
