// Health report and audit orchestration
//
// One `PkiAuditor::run` reads the configuration once, then probes the
// infrastructure, runs both check batteries and pulls the event window
// concurrently. Only a configuration failure aborts the run; everything else
// degrades its own section of the report.

use crate::Result;
use crate::anomaly::{Anomaly, AnomalyDetector};
use crate::checks::{CheckKind, CheckSet, Evaluator};
use crate::config::{AuditConfig, ConfigProvider};
use crate::error::PkiError;
use crate::events::{EventClassifier, EventType};
use crate::health::{HealthProber, HealthSnapshot, SectionStatus};
use crate::sources::{Collaborators, bounded};
use crate::status::{OverallStatus, StatusAggregator};
use crate::utils::Limiter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// What happened to the event window of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub source: SectionStatus,
    pub fetched: usize,
    pub classified: usize,
    pub unrecognized: usize,
    pub rejected: usize,
}

/// Anomalies over one event window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub timestamp: DateTime<Utc>,
    pub events: EventSummary,
    pub anomalies: Vec<Anomaly>,
}

/// The full result of one audit run. Owned by the caller once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub overall_status: OverallStatus,
    pub infrastructure: HealthSnapshot,
    pub compliance: CheckSet,
    pub security: CheckSet,
    pub anomalies: Vec<Anomaly>,
    pub recommendations: Vec<String>,
    pub events: EventSummary,
}

impl HealthReport {
    /// True when any part of the report was built from incomplete data
    pub fn is_degraded(&self) -> bool {
        !self.infrastructure.degraded_sections().is_empty()
            || !self.events.source.is_available()
            || self
                .compliance
                .iter()
                .chain(self.security.iter())
                .any(|(_, r)| !r.data_available)
    }
}

/// Runs audits against a set of collaborators
pub struct PkiAuditor {
    config_provider: Arc<dyn ConfigProvider>,
    collaborators: Collaborators,
}

impl PkiAuditor {
    pub fn new(config_provider: Arc<dyn ConfigProvider>, collaborators: Collaborators) -> Self {
        Self {
            config_provider,
            collaborators,
        }
    }

    /// Full audit ending now
    pub async fn run(&self) -> Result<HealthReport> {
        self.run_at(Utc::now()).await
    }

    /// Full audit with `now` as the end of the event window and the reference
    /// time for validity calculations
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<HealthReport> {
        let config = self.config_provider.get()?;
        let window_start = window_start(&config, now)?;
        info!("Starting PKI audit");

        // One permit pool for every probe and check of the run
        let limiter = Limiter::new(config.probe.parallelism);
        let prober =
            HealthProber::new(self.collaborators.infrastructure.clone()).with_limiter(limiter.clone());
        let evaluator =
            Evaluator::new(self.collaborators.configuration.clone()).with_limiter(limiter);

        let (infrastructure, compliance, security, anomaly_report) = tokio::join!(
            prober.probe_at(&config, now),
            evaluator.evaluate(CheckKind::Compliance, &config),
            evaluator.evaluate(CheckKind::Security, &config),
            self.collect_anomalies(&config, window_start, now),
        );

        let summary = StatusAggregator::new().aggregate(&infrastructure, &compliance, &security);
        let mut overall_status = summary.overall;
        let mut recommendations = summary.recommendations;

        if let SectionStatus::Unknown { detail } = &anomaly_report.events.source {
            overall_status = overall_status.max(OverallStatus::Warning);
            recommendations.push(format!(
                "Audit event log unavailable, anomaly detection skipped: {}",
                detail
            ));
        }

        info!(
            "Audit complete: {} ({} anomalies, {} recommendations)",
            overall_status,
            anomaly_report.anomalies.len(),
            recommendations.len()
        );

        Ok(HealthReport {
            timestamp: now,
            overall_status,
            infrastructure,
            compliance,
            security,
            anomalies: anomaly_report.anomalies,
            recommendations,
            events: anomaly_report.events,
        })
    }

    /// Only pull events and detect anomalies
    pub async fn detect_anomalies(&self) -> Result<AnomalyReport> {
        self.detect_anomalies_at(Utc::now()).await
    }

    pub async fn detect_anomalies_at(&self, now: DateTime<Utc>) -> Result<AnomalyReport> {
        let config = self.config_provider.get()?;
        let window_start = window_start(&config, now)?;
        Ok(self.collect_anomalies(&config, window_start, now).await)
    }

    async fn collect_anomalies(
        &self,
        config: &AuditConfig,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AnomalyReport {
        let ids = EventType::all_ids();

        let raws = match bounded(
            "event log query",
            config.probe.timeout(),
            self.collaborators.events.query(window_start, now, &ids),
        )
        .await
        {
            Ok(raws) => raws,
            Err(e) => {
                warn!("Event source unavailable: {}", e);
                return AnomalyReport {
                    timestamp: now,
                    events: EventSummary {
                        window_start,
                        window_end: now,
                        source: SectionStatus::unknown(e.to_string()),
                        fetched: 0,
                        classified: 0,
                        unrecognized: 0,
                        rejected: 0,
                    },
                    anomalies: Vec::new(),
                };
            }
        };

        let classified = EventClassifier::new(config.schema.clone()).classify_all(&raws);
        if !classified.rejected.is_empty() {
            warn!("{} events rejected during classification", classified.rejected.len());
        }

        let anomalies = AnomalyDetector::new().detect(&classified.events, &config.thresholds);

        AnomalyReport {
            timestamp: now,
            events: EventSummary {
                window_start,
                window_end: now,
                source: SectionStatus::Available,
                fetched: raws.len(),
                classified: classified.events.len(),
                unrecognized: classified.unrecognized,
                rejected: classified.rejected.len(),
            },
            anomalies,
        }
    }
}

/// Start of the event window ending at `now`
fn window_start(config: &AuditConfig, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let window = config.probe.event_window()?;
    now.checked_sub_signed(window)
        .ok_or_else(|| PkiError::ConfigInvalid {
            message: format!(
                "event window of {} hours reaches before the earliest representable time",
                config.probe.event_window_hours
            ),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfigProvider;
    use crate::sources::{Inventory, InventorySource};
    use chrono::Duration as ChronoDuration;

    struct BrokenConfig;

    impl ConfigProvider for BrokenConfig {
        fn get(&self) -> Result<AuditConfig> {
            Err(PkiError::ConfigUnavailable {
                details: "file missing".to_string(),
            })
        }
    }

    /// Hands out whatever it holds, without validation
    struct UncheckedConfig(AuditConfig);

    impl ConfigProvider for UncheckedConfig {
        fn get(&self) -> Result<AuditConfig> {
            Ok(self.0.clone())
        }
    }

    fn empty_collaborators() -> Collaborators {
        Collaborators::uniform(Arc::new(InventorySource::new(Inventory::default())))
    }

    #[tokio::test]
    async fn test_config_failure_is_fatal() {
        let auditor = PkiAuditor::new(Arc::new(BrokenConfig), empty_collaborators());
        let err = auditor.run().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, PkiError::ConfigUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_empty_inventory_yields_degraded_report() {
        let auditor = PkiAuditor::new(
            Arc::new(StaticConfigProvider::new(AuditConfig::default())),
            empty_collaborators(),
        );

        let report = auditor.run().await.unwrap();

        assert!(report.is_degraded());
        assert!(!report.events.source.is_available());
        assert!(report.anomalies.is_empty());
        // Directory unreadable means the root cannot be confirmed online
        assert_eq!(report.overall_status, OverallStatus::Critical);
        assert_eq!(report.compliance.len(), 6);
        assert_eq!(report.security.len(), 8);
        assert!(report.compliance.iter().all(|(_, r)| !r.passed));
        assert!(
            report
                .recommendations
                .last()
                .unwrap()
                .starts_with("Audit event log unavailable")
        );
    }

    #[tokio::test]
    async fn test_detect_anomalies_only() {
        let auditor = PkiAuditor::new(
            Arc::new(StaticConfigProvider::new(AuditConfig::default())),
            Collaborators::uniform(Arc::new(InventorySource::new(Inventory {
                events: Some(vec![]),
                ..Default::default()
            }))),
        );

        let report = auditor.detect_anomalies().await.unwrap();
        assert!(report.events.source.is_available());
        assert_eq!(report.events.fetched, 0);
        assert!(report.anomalies.is_empty());
        assert_eq!(
            report.events.window_end - report.events.window_start,
            ChronoDuration::hours(24)
        );
    }

    #[tokio::test]
    async fn test_oversized_event_window_is_config_error() {
        let mut config = AuditConfig::default();
        config.probe.event_window_hours = 1_000_000_000_000;
        let auditor = PkiAuditor::new(Arc::new(UncheckedConfig(config)), empty_collaborators());

        let err = auditor.run().await.unwrap_err();
        assert!(matches!(err, PkiError::ConfigInvalid { .. }));
        assert!(err.is_fatal());

        let err = auditor.detect_anomalies().await.unwrap_err();
        assert!(matches!(err, PkiError::ConfigInvalid { .. }));
    }
}
