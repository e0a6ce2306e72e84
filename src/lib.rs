// PKIWatch - PKI health, compliance and anomaly auditing
// Copyright (C) 2025 PKIWatch Team
// Licensed under GPL-3.0

//! PKIWatch audits an Active Directory Certificate Services deployment.
//!
//! It classifies CA and Kerberos audit events, detects anomalies in them,
//! probes authorities, CRLs, OCSP responders and services, runs compliance and
//! ESC security checks, and folds everything into a single `HealthReport` with
//! an overall status and recommendations. Every external system is reached
//! through the collaborator traits in [`sources`].

pub mod anomaly;
pub mod checks;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod output;
pub mod report;
pub mod sources;
pub mod status;
pub mod utils;

// Re-export commonly used types
pub use crate::anomaly::{Anomaly, AnomalyDetector, AnomalyKind, AnomalySeverity};
pub use crate::checks::{CheckKind, CheckResult, CheckSet, Evaluator};
pub use crate::cli::Args;
pub use crate::config::{AuditConfig, ConfigProvider, FileConfigProvider, StaticConfigProvider};
pub use crate::error::PkiError;
pub use crate::events::{ClassifiedEvent, EventClassifier, RawEvent};
pub use crate::health::{HealthProber, HealthSnapshot};
pub use crate::report::{AnomalyReport, HealthReport, PkiAuditor};
pub use crate::status::{OverallStatus, StatusAggregator};

/// Result type for PKIWatch operations
pub type Result<T> = std::result::Result<T, PkiError>;
