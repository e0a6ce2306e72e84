// Security checks - AD CS privilege-escalation classes (ESC1..ESC11)
//
// Each check reports a finding when the published configuration lets a
// low-privilege principal obtain a certificate it can authenticate as someone
// else with, or take control of the CA or a template.

use super::{Check, CheckResult, low_privilege};
use crate::Result;
use crate::config::AuditConfig;
use crate::sources::{CaRight, CertificateTemplate, ConfigurationSources};
use async_trait::async_trait;

/// Enrollee supplies subject on a client-auth template
pub struct Esc1;

/// Any-purpose or no-EKU template
pub struct Esc2;

/// Enrollment-agent template
pub struct Esc3;

/// Low-privilege write access to a template object
pub struct Esc4;

/// EDITF_ATTRIBUTESUBJECTALTNAME2 set on the CA
pub struct Esc6;

/// Low-privilege ManageCA / ManageCertificates on the CA
pub struct Esc7;

/// NTLM relay to HTTP web enrollment
pub struct Esc8;

/// RPC enrollment without packet privacy
pub struct Esc11;

/// The full security battery, in reporting order
pub fn battery() -> Vec<Box<dyn Check>> {
    vec![
        Box::new(Esc1),
        Box::new(Esc2),
        Box::new(Esc3),
        Box::new(Esc4),
        Box::new(Esc6),
        Box::new(Esc7),
        Box::new(Esc8),
        Box::new(Esc11),
    ]
}

/// Templates matching `vulnerable` that low-privilege principals can enroll in
/// without an issuance gate, formatted as `Template (principal, ...)`
fn exposed_templates<F>(
    templates: &[CertificateTemplate],
    config: &AuditConfig,
    vulnerable: F,
) -> Vec<String>
where
    F: Fn(&CertificateTemplate) -> bool,
{
    templates
        .iter()
        .filter(|&t| vulnerable(t) && !t.has_issuance_gate())
        .filter_map(|t| {
            let enrollees = low_privilege(&t.enrollment_principals, config);
            (!enrollees.is_empty()).then(|| format!("{} ({})", t.name, enrollees.join(", ")))
        })
        .collect()
}

fn template_result(
    exposed: Vec<String>,
    total: usize,
    finding: &str,
    recommendation: &str,
) -> CheckResult {
    if exposed.is_empty() {
        CheckResult::pass(format!("No vulnerable templates among {} published", total))
    } else {
        CheckResult::fail(format!("{}: {}", finding, exposed.join(", ")), recommendation)
    }
}

#[async_trait]
impl Check for Esc1 {
    fn name(&self) -> &'static str {
        "ESC1"
    }

    async fn run(&self, sources: &ConfigurationSources, config: &AuditConfig) -> Result<CheckResult> {
        let templates = sources.templates.templates().await?;
        let exposed = exposed_templates(&templates, config, |t| {
            t.enrollee_supplies_subject && t.allows_client_auth()
        });
        Ok(template_result(
            exposed,
            templates.len(),
            "Enrollee-supplied subject on client authentication templates",
            "Clear 'Supply in the request' or require CA manager approval on these templates",
        ))
    }
}

#[async_trait]
impl Check for Esc2 {
    fn name(&self) -> &'static str {
        "ESC2"
    }

    async fn run(&self, sources: &ConfigurationSources, config: &AuditConfig) -> Result<CheckResult> {
        let templates = sources.templates.templates().await?;
        let exposed = exposed_templates(&templates, config, CertificateTemplate::is_any_purpose);
        Ok(template_result(
            exposed,
            templates.len(),
            "Any-purpose templates open to low-privilege enrollment",
            "Restrict the EKUs of these templates or limit enrollment to privileged groups",
        ))
    }
}

#[async_trait]
impl Check for Esc3 {
    fn name(&self) -> &'static str {
        "ESC3"
    }

    async fn run(&self, sources: &ConfigurationSources, config: &AuditConfig) -> Result<CheckResult> {
        let templates = sources.templates.templates().await?;
        let exposed =
            exposed_templates(&templates, config, CertificateTemplate::is_enrollment_agent);
        Ok(template_result(
            exposed,
            templates.len(),
            "Enrollment agent templates open to low-privilege enrollment",
            "Limit enrollment agent templates to designated agents and configure enrollment agent restrictions on the CA",
        ))
    }
}

#[async_trait]
impl Check for Esc4 {
    fn name(&self) -> &'static str {
        "ESC4"
    }

    async fn run(&self, sources: &ConfigurationSources, config: &AuditConfig) -> Result<CheckResult> {
        let templates = sources.templates.templates().await?;

        let writable: Vec<String> = templates
            .iter()
            .filter_map(|t| {
                let writers = low_privilege(&t.write_principals, config);
                (!writers.is_empty()).then(|| format!("{} ({})", t.name, writers.join(", ")))
            })
            .collect();

        if writable.is_empty() {
            Ok(CheckResult::pass(format!(
                "No low-privilege write access on {} templates",
                templates.len()
            )))
        } else {
            Ok(CheckResult::fail(
                format!("Templates writable by low-privilege principals: {}", writable.join(", ")),
                "Remove Write/Full Control/Owner rights for broad groups from these template objects",
            ))
        }
    }
}

#[async_trait]
impl Check for Esc6 {
    fn name(&self) -> &'static str {
        "ESC6"
    }

    async fn run(&self, sources: &ConfigurationSources, _config: &AuditConfig) -> Result<CheckResult> {
        let policy = sources.policy.ca_policy().await?;

        if policy.san_attribute_allowed() {
            Ok(CheckResult::fail(
                "EDITF_ATTRIBUTESUBJECTALTNAME2 is enabled on the CA",
                "Run 'certutil -setreg policy\\EditFlags -EDITF_ATTRIBUTESUBJECTALTNAME2' and restart CertSvc",
            ))
        } else {
            Ok(CheckResult::pass("Request attributes cannot specify a SAN"))
        }
    }
}

#[async_trait]
impl Check for Esc7 {
    fn name(&self) -> &'static str {
        "ESC7"
    }

    async fn run(&self, sources: &ConfigurationSources, config: &AuditConfig) -> Result<CheckResult> {
        let permissions = sources.policy.ca_permissions().await?;

        let risky: Vec<String> = permissions
            .iter()
            .filter(|p| config.baseline.is_low_privilege(&p.principal))
            .filter(|p| {
                p.rights
                    .iter()
                    .any(|r| matches!(r, CaRight::ManageCa | CaRight::ManageCertificates))
            })
            .map(|p| p.principal.clone())
            .collect();

        if risky.is_empty() {
            Ok(CheckResult::pass("CA management rights limited to privileged principals"))
        } else {
            Ok(CheckResult::fail(
                format!("CA management rights granted to: {}", risky.join(", ")),
                "Remove ManageCA and Issue and Manage Certificates rights from broad groups",
            ))
        }
    }
}

#[async_trait]
impl Check for Esc8 {
    fn name(&self) -> &'static str {
        "ESC8"
    }

    async fn run(&self, sources: &ConfigurationSources, _config: &AuditConfig) -> Result<CheckResult> {
        let endpoints = sources.templates.enrollment_endpoints().await?;

        let relayable: Vec<&str> = endpoints
            .iter()
            .filter(|e| !e.is_https() || !e.epa_enabled)
            .map(|e| e.url.as_str())
            .collect();

        if relayable.is_empty() {
            Ok(CheckResult::pass(format!(
                "{} web enrollment endpoints protected",
                endpoints.len()
            )))
        } else {
            Ok(CheckResult::fail(
                format!("NTLM-relayable enrollment endpoints: {}", relayable.join(", ")),
                "Require HTTPS and enable Extended Protection for Authentication on web enrollment, or remove it",
            ))
        }
    }
}

#[async_trait]
impl Check for Esc11 {
    fn name(&self) -> &'static str {
        "ESC11"
    }

    async fn run(&self, sources: &ConfigurationSources, _config: &AuditConfig) -> Result<CheckResult> {
        let policy = sources.policy.ca_policy().await?;

        if policy.rpc_encryption_enforced() {
            Ok(CheckResult::pass("RPC enrollment requires packet privacy"))
        } else {
            Ok(CheckResult::fail(
                "IF_ENFORCEENCRYPTICERTREQUEST is not set; RPC enrollment accepts unencrypted requests",
                "Run 'certutil -setreg CA\\InterfaceFlags +IF_ENFORCEENCRYPTICERTREQUEST' and restart CertSvc",
            ))
        }
    }
}
