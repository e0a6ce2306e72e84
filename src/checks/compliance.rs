// Compliance checks - CA policy, roles, SCHANNEL and host hardening against the baseline

use super::{Check, CheckResult};
use crate::Result;
use crate::config::AuditConfig;
use crate::sources::ConfigurationSources;
use async_trait::async_trait;

/// CA AuditFilter enables every required audit category
pub struct AuditPolicy;

/// Required server roles and features are installed
pub struct RequiredRoles;

/// Legacy protocols disabled, required protocols enabled
pub struct ProtocolCompliance;

/// No weak cipher suites enabled, required suites present
pub struct CipherSuiteCompliance;

/// Published templates meet the minimum key length
pub struct TemplateKeyLength;

/// Host hardening switches
pub struct SystemHardening;

/// The full compliance battery, in reporting order
pub fn battery() -> Vec<Box<dyn Check>> {
    vec![
        Box::new(AuditPolicy),
        Box::new(RequiredRoles),
        Box::new(ProtocolCompliance),
        Box::new(CipherSuiteCompliance),
        Box::new(TemplateKeyLength),
        Box::new(SystemHardening),
    ]
}

#[async_trait]
impl Check for AuditPolicy {
    fn name(&self) -> &'static str {
        "AuditPolicy"
    }

    async fn run(&self, sources: &ConfigurationSources, config: &AuditConfig) -> Result<CheckResult> {
        let policy = sources.policy.ca_policy().await?;
        let required = config.baseline.required_audit_filter;
        let missing = required & !policy.audit_filter;

        if missing == 0 {
            return Ok(CheckResult::pass(format!(
                "CA audit filter {} covers required categories",
                policy.audit_filter
            )));
        }

        Ok(CheckResult::fail(
            format!(
                "CA audit filter is {} (missing bits 0x{:x})",
                policy.audit_filter, missing
            ),
            format!(
                "Set the CA AuditFilter to {} and enable 'Audit Certification Services' in the local audit policy",
                required
            ),
        ))
    }
}

#[async_trait]
impl Check for RequiredRoles {
    fn name(&self) -> &'static str {
        "RequiredRoles"
    }

    async fn run(&self, sources: &ConfigurationSources, config: &AuditConfig) -> Result<CheckResult> {
        let installed = sources.features.installed_features().await?;

        let missing: Vec<&str> = config
            .baseline
            .required_features
            .iter()
            .filter(|required| !installed.iter().any(|f| f.eq_ignore_ascii_case(required)))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(CheckResult::pass(format!(
                "All {} required features installed",
                config.baseline.required_features.len()
            )))
        } else {
            Ok(CheckResult::fail(
                format!("Missing features: {}", missing.join(", ")),
                format!("Install the missing role services: {}", missing.join(", ")),
            ))
        }
    }
}

#[async_trait]
impl Check for ProtocolCompliance {
    fn name(&self) -> &'static str {
        "ProtocolCompliance"
    }

    async fn run(&self, sources: &ConfigurationSources, config: &AuditConfig) -> Result<CheckResult> {
        let protocols = sources.protocols.protocols().await?;
        let is_enabled = |name: &str| {
            protocols
                .iter()
                .any(|p| p.enabled && p.name.eq_ignore_ascii_case(name))
        };

        let legacy: Vec<&str> = config
            .baseline
            .disabled_protocols
            .iter()
            .map(String::as_str)
            .filter(|name| is_enabled(*name))
            .collect();
        let absent: Vec<&str> = config
            .baseline
            .required_protocols
            .iter()
            .map(String::as_str)
            .filter(|name| !is_enabled(*name))
            .collect();

        if legacy.is_empty() && absent.is_empty() {
            return Ok(CheckResult::pass("Protocol configuration matches baseline"));
        }

        let mut problems = Vec::new();
        if !legacy.is_empty() {
            problems.push(format!("legacy protocols enabled: {}", legacy.join(", ")));
        }
        if !absent.is_empty() {
            problems.push(format!("required protocols disabled: {}", absent.join(", ")));
        }

        Ok(CheckResult::fail(
            problems.join("; "),
            "Disable SSL 2.0/3.0 and TLS 1.0/1.1 under SCHANNEL\\Protocols and enable TLS 1.2 or later",
        ))
    }
}

#[async_trait]
impl Check for CipherSuiteCompliance {
    fn name(&self) -> &'static str {
        "CipherSuiteCompliance"
    }

    async fn run(&self, sources: &ConfigurationSources, config: &AuditConfig) -> Result<CheckResult> {
        let suites = sources.protocols.cipher_suites().await?;

        let weak: Vec<&str> = suites
            .iter()
            .filter(|suite| {
                let upper = suite.to_ascii_uppercase();
                config
                    .baseline
                    .denied_cipher_fragments
                    .iter()
                    .any(|fragment| upper.contains(&fragment.to_ascii_uppercase()))
            })
            .map(String::as_str)
            .collect();
        let missing: Vec<&str> = config
            .baseline
            .required_cipher_suites
            .iter()
            .filter(|required| !suites.iter().any(|s| s.eq_ignore_ascii_case(required)))
            .map(String::as_str)
            .collect();

        if weak.is_empty() && missing.is_empty() {
            return Ok(CheckResult::pass(format!(
                "{} cipher suites enabled, none weak",
                suites.len()
            )));
        }

        let mut problems = Vec::new();
        if !weak.is_empty() {
            problems.push(format!("weak suites enabled: {}", weak.join(", ")));
        }
        if !missing.is_empty() {
            problems.push(format!("required suites missing: {}", missing.join(", ")));
        }

        Ok(CheckResult::fail(
            problems.join("; "),
            "Update the SSL cipher suite order policy to remove weak suites and include the required ones",
        ))
    }
}

#[async_trait]
impl Check for TemplateKeyLength {
    fn name(&self) -> &'static str {
        "TemplateKeyLength"
    }

    async fn run(&self, sources: &ConfigurationSources, config: &AuditConfig) -> Result<CheckResult> {
        let templates = sources.templates.templates().await?;
        let minimum = config.thresholds.min_key_length;

        let short: Vec<String> = templates
            .iter()
            .filter(|t| t.min_key_length < minimum)
            .map(|t| format!("{} ({} bits)", t.name, t.min_key_length))
            .collect();

        if short.is_empty() {
            Ok(CheckResult::pass(format!(
                "{} templates require at least {} bits",
                templates.len(),
                minimum
            )))
        } else {
            Ok(CheckResult::fail(
                format!("Templates below {} bits: {}", minimum, short.join(", ")),
                format!("Raise the minimum key size of these templates to {} bits", minimum),
            ))
        }
    }
}

#[async_trait]
impl Check for SystemHardening {
    fn name(&self) -> &'static str {
        "SystemHardening"
    }

    async fn run(&self, sources: &ConfigurationSources, _config: &AuditConfig) -> Result<CheckResult> {
        let state = sources.hardening.hardening().await?;

        let failing: Vec<&str> = [
            (state.smb_signing_required, "SMB signing not required"),
            (state.ldap_signing_required, "LDAP signing not required"),
            (state.ntlmv1_disabled, "NTLMv1 allowed"),
            (state.lm_hash_storage_disabled, "LM hashes stored"),
            (state.remote_registry_disabled, "Remote Registry enabled"),
        ]
        .into_iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, label)| label)
        .collect();

        if failing.is_empty() {
            Ok(CheckResult::pass("Host hardening settings match baseline"))
        } else {
            Ok(CheckResult::fail(
                failing.join("; "),
                "Apply the CA server hardening GPO (SMB/LDAP signing, NTLMv2 only, NoLMHash, Remote Registry disabled)",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{
        CaPermission, CaPolicySettings, CertificateTemplate, EnrollmentEndpoint, FeatureSource,
        HardeningSource, HardeningState, PolicySource, ProtocolSetting, ProtocolSource,
        TemplateSource,
    };
    use std::sync::Arc;

    struct FakeHost {
        audit_filter: u32,
        features: Vec<String>,
        protocols: Vec<ProtocolSetting>,
        suites: Vec<String>,
        templates: Vec<CertificateTemplate>,
        hardening: HardeningState,
    }

    impl Default for FakeHost {
        fn default() -> Self {
            Self {
                audit_filter: 127,
                features: vec!["ADCS-Cert-Authority".to_string(), "ADCS-Online-Cert".to_string()],
                protocols: vec![
                    ProtocolSetting {
                        name: "TLS 1.0".to_string(),
                        enabled: false,
                    },
                    ProtocolSetting {
                        name: "TLS 1.2".to_string(),
                        enabled: true,
                    },
                ],
                suites: vec![
                    "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384".to_string(),
                    "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256".to_string(),
                ],
                templates: vec![],
                hardening: HardeningState {
                    smb_signing_required: true,
                    ldap_signing_required: true,
                    ntlmv1_disabled: true,
                    lm_hash_storage_disabled: true,
                    remote_registry_disabled: true,
                },
            }
        }
    }

    #[async_trait]
    impl PolicySource for FakeHost {
        async fn ca_policy(&self) -> Result<CaPolicySettings> {
            Ok(CaPolicySettings {
                audit_filter: self.audit_filter,
                edit_flags: 0,
                interface_flags: CaPolicySettings::IF_ENFORCEENCRYPTICERTREQUEST,
            })
        }

        async fn ca_permissions(&self) -> Result<Vec<CaPermission>> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl FeatureSource for FakeHost {
        async fn installed_features(&self) -> Result<Vec<String>> {
            Ok(self.features.clone())
        }
    }

    #[async_trait]
    impl ProtocolSource for FakeHost {
        async fn protocols(&self) -> Result<Vec<ProtocolSetting>> {
            Ok(self.protocols.clone())
        }

        async fn cipher_suites(&self) -> Result<Vec<String>> {
            Ok(self.suites.clone())
        }
    }

    #[async_trait]
    impl HardeningSource for FakeHost {
        async fn hardening(&self) -> Result<HardeningState> {
            Ok(self.hardening)
        }
    }

    #[async_trait]
    impl TemplateSource for FakeHost {
        async fn templates(&self) -> Result<Vec<CertificateTemplate>> {
            Ok(self.templates.clone())
        }

        async fn enrollment_endpoints(&self) -> Result<Vec<EnrollmentEndpoint>> {
            Ok(vec![])
        }
    }

    fn sources(host: FakeHost) -> ConfigurationSources {
        let host = Arc::new(host);
        ConfigurationSources {
            policy: host.clone(),
            features: host.clone(),
            protocols: host.clone(),
            hardening: host.clone(),
            templates: host,
        }
    }

    #[tokio::test]
    async fn test_baseline_host_passes_everything() {
        let sources = sources(FakeHost::default());
        let config = AuditConfig::default();

        for check in battery() {
            let result = check.run(&sources, &config).await.unwrap();
            assert!(result.passed, "{} failed: {}", check.name(), result.detail);
        }
    }

    #[tokio::test]
    async fn test_audit_filter_missing_bits() {
        let sources = sources(FakeHost {
            audit_filter: 0x0f,
            ..Default::default()
        });
        let result = AuditPolicy.run(&sources, &AuditConfig::default()).await.unwrap();

        assert!(!result.passed);
        assert!(result.detail.contains("0x70"));
        assert!(result.recommendation.unwrap().contains("127"));
    }

    #[tokio::test]
    async fn test_missing_feature() {
        let sources = sources(FakeHost {
            features: vec!["adcs-cert-authority".to_string()],
            ..Default::default()
        });
        let result = RequiredRoles.run(&sources, &AuditConfig::default()).await.unwrap();

        assert!(!result.passed);
        assert_eq!(result.detail, "Missing features: ADCS-Online-Cert");
    }

    #[tokio::test]
    async fn test_legacy_protocol_enabled() {
        let mut host = FakeHost::default();
        host.protocols[0].enabled = true;
        let result = ProtocolCompliance
            .run(&sources(host), &AuditConfig::default())
            .await
            .unwrap();

        assert!(!result.passed);
        assert!(result.detail.contains("TLS 1.0"));
    }

    #[tokio::test]
    async fn test_weak_cipher_detected() {
        let mut host = FakeHost::default();
        host.suites.push("TLS_RSA_WITH_3DES_EDE_CBC_SHA".to_string());
        let result = CipherSuiteCompliance
            .run(&sources(host), &AuditConfig::default())
            .await
            .unwrap();

        assert!(!result.passed);
        assert!(result.detail.contains("TLS_RSA_WITH_3DES_EDE_CBC_SHA"));
    }

    #[tokio::test]
    async fn test_short_template_key() {
        let host = FakeHost {
            templates: vec![CertificateTemplate {
                name: "LegacyWeb".to_string(),
                enrollee_supplies_subject: false,
                ekus: vec![],
                requires_manager_approval: false,
                authorized_signatures: 0,
                enrollment_principals: vec![],
                write_principals: vec![],
                min_key_length: 1024,
            }],
            ..Default::default()
        };
        let result = TemplateKeyLength
            .run(&sources(host), &AuditConfig::default())
            .await
            .unwrap();

        assert!(!result.passed);
        assert!(result.detail.contains("LegacyWeb (1024 bits)"));
    }

    #[tokio::test]
    async fn test_hardening_gaps_listed() {
        let mut host = FakeHost::default();
        host.hardening.ntlmv1_disabled = false;
        host.hardening.remote_registry_disabled = false;
        let result = SystemHardening
            .run(&sources(host), &AuditConfig::default())
            .await
            .unwrap();

        assert_eq!(result.detail, "NTLMv1 allowed; Remote Registry enabled");
    }
}
