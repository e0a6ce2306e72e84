// Commands module - Command Pattern implementation
// Copyright (C) 2025 PKIWatch Team
// Licensed under GPL-3.0

mod command;
mod router;

// Individual command implementations
mod anomalies;
mod audit;
mod config_example;

pub use command::Command;
pub use router::CommandRouter;

pub use anomalies::AnomaliesCommand;
pub use audit::AuditCommand;
pub use config_example::ConfigExampleCommand;

use crate::config::{AuditConfig, ConfigProvider, FileConfigProvider, StaticConfigProvider};
use crate::error::PkiError;
use crate::report::PkiAuditor;
use crate::sources::{Collaborators, InventorySource};
use crate::{Args, Result};
use std::sync::Arc;

/// Build an auditor from `--inventory` and `--config`
pub(crate) fn build_auditor(args: &Args) -> Result<PkiAuditor> {
    let inventory_path = args
        .sources
        .inventory
        .as_ref()
        .ok_or_else(|| PkiError::Other("--inventory <FILE> is required".to_string()))?;

    let source = InventorySource::from_file(inventory_path)?;

    let provider: Arc<dyn ConfigProvider> = match &args.sources.config {
        Some(path) => Arc::new(FileConfigProvider::new(path)),
        None => Arc::new(StaticConfigProvider::new(AuditConfig::default())),
    };

    Ok(PkiAuditor::new(
        provider,
        Collaborators::uniform(Arc::new(source)),
    ))
}
