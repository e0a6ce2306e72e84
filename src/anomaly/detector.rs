// Anomaly Detector - threshold passes over a classified event window

use super::{Anomaly, AnomalyKind, AnomalySample};
use crate::config::Thresholds;
use crate::events::{CertificateRequest, ClassifiedEvent, KerberosRequest, hour_bucket};
use chrono::Timelike;
use std::collections::BTreeMap;
use tracing::debug;

/// Stateless anomaly detector.
///
/// Runs three independent passes (request volume per hour, Kerberos failures per
/// user, out-of-hours requests). The result depends only on the events and the
/// thresholds, and its order is stable: volume anomalies by bucket, Kerberos
/// anomalies by user, then the out-of-hours aggregate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnomalyDetector;

impl AnomalyDetector {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate all passes over the event window
    pub fn detect(&self, events: &[ClassifiedEvent], thresholds: &Thresholds) -> Vec<Anomaly> {
        let requests: Vec<&CertificateRequest> = events
            .iter()
            .filter_map(|e| match e {
                ClassifiedEvent::CertificateRequest(req) => Some(req),
                _ => None,
            })
            .collect();

        let kerberos: Vec<&KerberosRequest> = events
            .iter()
            .filter_map(|e| match e {
                ClassifiedEvent::KerberosRequest(krb) => Some(krb),
                _ => None,
            })
            .collect();

        let mut anomalies = Vec::new();
        anomalies.extend(self.check_request_volume(&requests, thresholds));
        anomalies.extend(self.check_kerberos_failures(&kerberos, thresholds));
        anomalies.extend(self.check_out_of_hours(&requests, thresholds));

        debug!(
            events = events.len(),
            anomalies = anomalies.len(),
            "Anomaly detection complete"
        );

        anomalies
    }

    /// One anomaly per hour bucket whose request count exceeds the limit
    pub fn check_request_volume(
        &self,
        requests: &[&CertificateRequest],
        thresholds: &Thresholds,
    ) -> Vec<Anomaly> {
        let mut per_hour: BTreeMap<String, usize> = BTreeMap::new();
        for req in requests {
            *per_hour.entry(hour_bucket(&req.timestamp)).or_default() += 1;
        }

        per_hour
            .into_iter()
            .filter(|(_, count)| exceeds(*count, thresholds.max_cert_requests_per_hour))
            .map(|(bucket, count)| Anomaly {
                kind: AnomalyKind::HighVolumeRequests,
                detail: format!(
                    "{} certificate requests in hour {} (limit {})",
                    count, bucket, thresholds.max_cert_requests_per_hour
                ),
                scope_key: bucket,
                count,
                severity: AnomalyKind::HighVolumeRequests.severity(),
                samples: Vec::new(),
            })
            .collect()
    }

    /// One anomaly per user whose failed TGT count exceeds the limit
    pub fn check_kerberos_failures(
        &self,
        requests: &[&KerberosRequest],
        thresholds: &Thresholds,
    ) -> Vec<Anomaly> {
        let mut per_user: BTreeMap<&str, usize> = BTreeMap::new();
        for krb in requests.iter().filter(|k| k.is_failure()) {
            *per_user.entry(krb.user.as_str()).or_default() += 1;
        }

        per_user
            .into_iter()
            .filter(|(_, count)| exceeds(*count, thresholds.max_failed_kerberos_per_user))
            .map(|(user, count)| Anomaly {
                kind: AnomalyKind::KerberosFailureBurst,
                scope_key: user.to_string(),
                count,
                detail: format!(
                    "{} failed Kerberos TGT requests for {} (limit {})",
                    count, user, thresholds.max_failed_kerberos_per_user
                ),
                severity: AnomalyKind::KerberosFailureBurst.severity(),
                samples: Vec::new(),
            })
            .collect()
    }

    /// A single aggregate anomaly covering every out-of-hours request.
    ///
    /// `count` is always the full total; the attached samples are capped at
    /// `max_out_of_hours_samples`.
    pub fn check_out_of_hours(
        &self,
        requests: &[&CertificateRequest],
        thresholds: &Thresholds,
    ) -> Vec<Anomaly> {
        let offending: Vec<&&CertificateRequest> = requests
            .iter()
            .filter(|req| !thresholds.is_business_hour(req.timestamp.hour()))
            .collect();

        if offending.is_empty() {
            return Vec::new();
        }

        let count = offending.len();
        let samples: Vec<AnomalySample> = offending
            .iter()
            .take(thresholds.max_out_of_hours_samples)
            .map(|req| AnomalySample {
                timestamp: req.timestamp,
                principal: req.requester.clone(),
                template: req.template.clone(),
                source_host: req.source_host.clone(),
            })
            .collect();

        let mut detail = format!(
            "{} certificate requests outside business hours {:02}:00-{:02}:00",
            count, thresholds.business_hours_start, thresholds.business_hours_end
        );
        if samples.len() < count {
            detail.push_str(&format!(" (showing first {})", samples.len()));
        }

        vec![Anomaly {
            kind: AnomalyKind::OutOfHoursActivity,
            scope_key: format!(
                "outside {:02}:00-{:02}:00",
                thresholds.business_hours_start, thresholds.business_hours_end
            ),
            count,
            detail,
            severity: AnomalyKind::OutOfHoursActivity.severity(),
            samples,
        }]
    }
}

/// `count > limit` with the limit taken literally, including zero and negatives
fn exceeds(count: usize, limit: i64) -> bool {
    i64::try_from(count).map_or(true, |c| c > limit)
}
