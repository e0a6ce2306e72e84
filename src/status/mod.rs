// Overall status and its aggregation

pub mod aggregator;

use serde::{Deserialize, Serialize};

pub use aggregator::{StatusAggregator, StatusSummary};

/// Overall PKI status, strictly ordered Healthy < Warning < Error < Critical
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum OverallStatus {
    #[default]
    Healthy,
    Warning,
    Error,
    Critical,
}

impl OverallStatus {
    /// Numeric weight used in exports (1..=4)
    pub fn weight(&self) -> u8 {
        match self {
            OverallStatus::Healthy => 1,
            OverallStatus::Warning => 2,
            OverallStatus::Error => 3,
            OverallStatus::Critical => 4,
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverallStatus::Healthy => write!(f, "Healthy"),
            OverallStatus::Warning => write!(f, "Warning"),
            OverallStatus::Error => write!(f, "Error"),
            OverallStatus::Critical => write!(f, "Critical"),
        }
    }
}
