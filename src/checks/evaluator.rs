// Check evaluator - runs a battery of checks concurrently and collects results by name

use super::{Check, CheckKind, CheckResult, CheckSet, compliance, security};
use crate::Result;
use crate::config::AuditConfig;
use crate::error::PkiError;
use crate::sources::{ConfigurationSources, bounded};
use crate::utils::Limiter;
use tracing::{debug, info, warn};

/// Runs compliance and security batteries against the configuration sources
pub struct Evaluator {
    sources: ConfigurationSources,
    limiter: Option<Limiter>,
}

impl Evaluator {
    pub fn new(sources: ConfigurationSources) -> Self {
        Self {
            sources,
            limiter: None,
        }
    }

    /// Draw check permits from a limiter shared with other work.
    /// Without one, each battery gets its own `probe.parallelism` limit.
    pub fn with_limiter(mut self, limiter: Limiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Every check in a battery
    pub fn checks(kind: CheckKind) -> Vec<Box<dyn Check>> {
        match kind {
            CheckKind::Compliance => compliance::battery(),
            CheckKind::Security => security::battery(),
        }
    }

    /// Names of every check in a battery
    pub fn check_names(kind: CheckKind) -> Vec<&'static str> {
        Self::checks(kind).iter().map(|check| check.name()).collect()
    }

    /// Run a whole battery. Every check appears in the result, including those
    /// whose data source was unavailable.
    pub async fn evaluate(&self, kind: CheckKind, config: &AuditConfig) -> CheckSet {
        let checks = Self::checks(kind);
        info!("Running {} {} checks", checks.len(), kind);

        let limiter = self
            .limiter
            .clone()
            .unwrap_or_else(|| Limiter::new(config.probe.parallelism));
        let results = limiter
            .join(checks.iter().map(|check| self.run_check(check.as_ref(), config)))
            .await;

        let set: CheckSet = checks
            .iter()
            .map(|check| check.name().to_string())
            .zip(results)
            .collect();

        debug!(
            "{} checks: {}/{} passed",
            kind,
            set.passed_count(),
            set.len()
        );
        set
    }

    /// Run one named check. An unknown name is a contract violation.
    pub async fn evaluate_named(
        &self,
        kind: CheckKind,
        name: &str,
        config: &AuditConfig,
    ) -> Result<CheckResult> {
        let checks = Self::checks(kind);
        let check = checks
            .iter()
            .find(|check| check.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| PkiError::UnknownCheck {
                kind: kind.to_string(),
                name: name.to_string(),
            })?;

        Ok(self.run_check(check.as_ref(), config).await)
    }

    async fn run_check(&self, check: &dyn Check, config: &AuditConfig) -> CheckResult {
        let operation = format!("{} check", check.name());
        match bounded(
            &operation,
            config.probe.timeout(),
            check.run(&self.sources, config),
        )
        .await
        {
            Ok(result) => {
                if !result.passed {
                    debug!("{} failed: {}", check.name(), result.detail);
                }
                result
            }
            Err(e) => {
                warn!("{} could not run: {}", check.name(), e);
                CheckResult::unavailable(e)
            }
        }
    }
}
