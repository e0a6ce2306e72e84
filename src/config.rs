// Audit configuration
//
// Thresholds, probe limits and the compliance baseline. The configuration is
// read once per run through a ConfigProvider and passed by reference to every
// component; nothing in the core keeps it in a global.

use crate::Result;
use crate::error::PkiError;
use crate::events::schema::EventSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use chrono::TimeDelta;
use std::time::Duration;
use tracing::warn;

/// Longest event window the auditor will query (one year)
pub const MAX_EVENT_WINDOW_HOURS: i64 = 24 * 366;

/// Longest authority certificate expiry warning (ten years)
pub const MAX_EXPIRATION_WARNING_DAYS: i64 = 3660;

/// Complete audit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AuditConfig {
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub probe: ProbeSettings,
    #[serde(default)]
    pub baseline: Baseline,
    #[serde(default)]
    pub schema: EventSchema,
}

/// Detection and expiry thresholds
///
/// Limits are signed: zero or negative values are legal and mean "flag everything".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// First business hour (inclusive, local time of the event)
    pub business_hours_start: u32,
    /// Last business hour (exclusive)
    pub business_hours_end: u32,
    pub max_cert_requests_per_hour: i64,
    pub max_failed_kerberos_per_user: i64,
    /// Warn when a CRL is this close to its nextUpdate
    pub crl_warning_hours: i64,
    /// Warn when an authority certificate expires within this many days
    pub cert_expiration_warning_days: i64,
    pub min_key_length: u32,
    /// Cap on offending requests attached to an out-of-hours anomaly
    pub max_out_of_hours_samples: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            business_hours_start: 8,
            business_hours_end: 18,
            max_cert_requests_per_hour: 100,
            max_failed_kerberos_per_user: 5,
            crl_warning_hours: 24,
            cert_expiration_warning_days: 30,
            min_key_length: 2048,
            max_out_of_hours_samples: 50,
        }
    }
}

impl Thresholds {
    /// Whether a local hour of day falls inside [start, end)
    pub fn is_business_hour(&self, hour: u32) -> bool {
        hour >= self.business_hours_start && hour < self.business_hours_end
    }

    /// Authority certificates expiring within this span are flagged
    pub fn expiration_warning(&self) -> Result<TimeDelta> {
        let days = self.cert_expiration_warning_days;
        if !(0..=MAX_EXPIRATION_WARNING_DAYS).contains(&days) {
            return Err(PkiError::ConfigInvalid {
                message: format!(
                    "cert_expiration_warning_days {} is outside 0..={}",
                    days, MAX_EXPIRATION_WARNING_DAYS
                ),
            });
        }

        TimeDelta::try_days(days).ok_or_else(|| PkiError::ConfigInvalid {
            message: format!("cert_expiration_warning_days {} is out of range", days),
        })
    }
}

/// Limits applied to every collaborator call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub timeout_ms: u64,
    /// Maximum number of per-item probes and checks in flight at once across a run
    pub parallelism: usize,
    /// How far back to query the event source
    pub event_window_hours: i64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            parallelism: 4,
            event_window_hours: 24,
        }
    }
}

impl ProbeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Length of the event window queried before `now`
    pub fn event_window(&self) -> Result<TimeDelta> {
        let hours = self.event_window_hours;
        if !(1..=MAX_EVENT_WINDOW_HOURS).contains(&hours) {
            return Err(PkiError::ConfigInvalid {
                message: format!(
                    "event_window_hours {} is outside 1..={}",
                    hours, MAX_EVENT_WINDOW_HOURS
                ),
            });
        }

        TimeDelta::try_hours(hours).ok_or_else(|| PkiError::ConfigInvalid {
            message: format!("event_window_hours {} is out of range", hours),
        })
    }
}

/// Expected state the compliance and security checks compare against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Baseline {
    pub required_cipher_suites: Vec<String>,
    /// Any enabled suite containing one of these fragments is non-compliant
    pub denied_cipher_fragments: Vec<String>,
    pub disabled_protocols: Vec<String>,
    pub required_protocols: Vec<String>,
    pub required_features: Vec<String>,
    pub monitored_services: Vec<String>,
    pub low_privilege_principals: Vec<String>,
    /// CA AuditFilter bitmask; 127 enables all seven audit categories
    pub required_audit_filter: u32,
}

impl Default for Baseline {
    fn default() -> Self {
        Self {
            required_cipher_suites: vec![
                "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384".to_string(),
                "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256".to_string(),
            ],
            denied_cipher_fragments: vec![
                "RC4".to_string(),
                "3DES".to_string(),
                "NULL".to_string(),
                "EXPORT".to_string(),
                "DES_CBC".to_string(),
            ],
            disabled_protocols: vec![
                "SSL 2.0".to_string(),
                "SSL 3.0".to_string(),
                "TLS 1.0".to_string(),
                "TLS 1.1".to_string(),
            ],
            required_protocols: vec!["TLS 1.2".to_string()],
            required_features: vec![
                "ADCS-Cert-Authority".to_string(),
                "ADCS-Online-Cert".to_string(),
            ],
            monitored_services: vec![
                "CertSvc".to_string(),
                "OcspSvc".to_string(),
                "W3SVC".to_string(),
            ],
            low_privilege_principals: vec![
                "Everyone".to_string(),
                "Authenticated Users".to_string(),
                "Domain Users".to_string(),
                "Domain Computers".to_string(),
                "Users".to_string(),
            ],
            required_audit_filter: 127,
        }
    }
}

impl Baseline {
    /// Case-insensitive membership test against the low-privilege principal list.
    ///
    /// Principals may be domain-qualified (`CORP\Domain Users`); only the part
    /// after the last backslash is compared.
    pub fn is_low_privilege(&self, principal: &str) -> bool {
        let short = principal.rsplit('\\').next().unwrap_or(principal).trim();
        self.low_privilege_principals
            .iter()
            .any(|p| p.eq_ignore_ascii_case(short))
    }
}

impl AuditConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents =
            fs::read_to_string(path.as_ref()).map_err(|e| PkiError::ConfigUnavailable {
                details: format!("failed to read {}: {}", path.as_ref().display(), e),
            })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| PkiError::ConfigInvalid {
            message: format!("failed to parse TOML config: {}", e),
        })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)?;

        fs::write(path.as_ref(), toml_str).map_err(|e| PkiError::FileSystem {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Ok(())
    }

    /// Write a default configuration to `path` as a starting point
    pub fn create_example<P: AsRef<Path>>(path: P) -> Result<()> {
        Self::default().save_to_file(path)
    }

    /// Reject values no component can work with.
    ///
    /// Non-positive detection limits are allowed and only logged: the detector
    /// honours them literally.
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;

        if t.business_hours_end > 24 {
            return Err(PkiError::ConfigInvalid {
                message: format!("business_hours_end {} exceeds 24", t.business_hours_end),
            });
        }

        if t.business_hours_start >= t.business_hours_end {
            return Err(PkiError::ConfigInvalid {
                message: format!(
                    "business hours [{}, {}) are empty",
                    t.business_hours_start, t.business_hours_end
                ),
            });
        }

        if self.probe.parallelism == 0 {
            return Err(PkiError::ConfigInvalid {
                message: "probe.parallelism must be at least 1".to_string(),
            });
        }

        if self.probe.timeout_ms == 0 {
            return Err(PkiError::ConfigInvalid {
                message: "probe.timeout_ms must be greater than 0".to_string(),
            });
        }

        self.probe.event_window()?;
        t.expiration_warning()?;

        if t.max_cert_requests_per_hour <= 0 {
            warn!(
                limit = t.max_cert_requests_per_hour,
                "max_cert_requests_per_hour is not positive; every request hour will be flagged"
            );
        }

        if t.max_failed_kerberos_per_user <= 0 {
            warn!(
                limit = t.max_failed_kerberos_per_user,
                "max_failed_kerberos_per_user is not positive; every failing user will be flagged"
            );
        }

        self.schema.validate()?;

        Ok(())
    }
}

/// Supplies the configuration for one evaluation run
pub trait ConfigProvider: Send + Sync {
    fn get(&self) -> Result<AuditConfig>;
}

/// Reads and validates a TOML configuration file on every `get`
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for FileConfigProvider {
    fn get(&self) -> Result<AuditConfig> {
        let config = AuditConfig::from_file(&self.path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Hands out a fixed, already-built configuration
pub struct StaticConfigProvider {
    config: AuditConfig,
}

impl StaticConfigProvider {
    pub fn new(config: AuditConfig) -> Self {
        Self { config }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn get(&self) -> Result<AuditConfig> {
        self.config.validate()?;
        Ok(self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuditConfig::default();
        assert_eq!(config.thresholds.business_hours_start, 8);
        assert_eq!(config.thresholds.business_hours_end, 18);
        assert_eq!(config.thresholds.max_cert_requests_per_hour, 100);
        assert_eq!(config.thresholds.max_failed_kerberos_per_user, 5);
        assert_eq!(config.probe.parallelism, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_business_hours_window() {
        let t = Thresholds::default();
        assert!(!t.is_business_hour(7));
        assert!(t.is_business_hour(8));
        assert!(t.is_business_hour(17));
        assert!(!t.is_business_hour(18));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AuditConfig::from_toml(
            r#"
            [thresholds]
            max_cert_requests_per_hour = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.thresholds.max_cert_requests_per_hour, 250);
        assert_eq!(config.thresholds.business_hours_start, 8);
        assert_eq!(config.baseline.required_audit_filter, 127);
    }

    #[test]
    fn test_negative_thresholds_are_valid() {
        let mut config = AuditConfig::default();
        config.thresholds.max_cert_requests_per_hour = -1;
        config.thresholds.max_failed_kerberos_per_user = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_business_hours_rejected() {
        let mut config = AuditConfig::default();
        config.thresholds.business_hours_start = 18;
        config.thresholds.business_hours_end = 8;
        assert!(matches!(
            config.validate(),
            Err(PkiError::ConfigInvalid { .. })
        ));

        config.thresholds.business_hours_start = 0;
        config.thresholds.business_hours_end = 25;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let mut config = AuditConfig::default();
        config.probe.parallelism = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_windows_rejected() {
        let mut config = AuditConfig::default();
        config.probe.event_window_hours = 1_000_000_000_000;
        assert!(matches!(
            config.validate(),
            Err(PkiError::ConfigInvalid { .. })
        ));

        config.probe.event_window_hours = 0;
        assert!(config.validate().is_err());

        let mut config = AuditConfig::default();
        config.thresholds.cert_expiration_warning_days = i64::MAX / 2;
        assert!(matches!(
            config.validate(),
            Err(PkiError::ConfigInvalid { .. })
        ));

        config.thresholds.cert_expiration_warning_days = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_window_durations() {
        let config = AuditConfig::default();
        assert_eq!(config.probe.event_window().unwrap(), TimeDelta::hours(24));
        assert_eq!(
            config.thresholds.expiration_warning().unwrap(),
            TimeDelta::days(30)
        );
    }

    #[test]
    fn test_low_privilege_matching() {
        let baseline = Baseline::default();
        assert!(baseline.is_low_privilege("CORP\\Domain Users"));
        assert!(baseline.is_low_privilege("authenticated users"));
        assert!(!baseline.is_low_privilege("CORP\\Enterprise Admins"));
    }

    #[test]
    fn test_missing_file_is_config_unavailable() {
        let provider = FileConfigProvider::new("/nonexistent/pkiwatch.toml");
        let err = provider.get().unwrap_err();
        assert!(matches!(err, PkiError::ConfigUnavailable { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkiwatch.toml");

        let mut config = AuditConfig::default();
        config.thresholds.min_key_length = 4096;
        config.save_to_file(&path).unwrap();

        let loaded = FileConfigProvider::new(&path).get().unwrap();
        assert_eq!(loaded, config);
    }
}
