// CommandRouter - Routes CLI arguments to appropriate Command
// Copyright (C) 2025 PKIWatch Team
// Licensed under GPL-3.0

use super::{AnomaliesCommand, AuditCommand, Command, ConfigExampleCommand};
use crate::error::PkiError;
use crate::{Args, Result};

/// Picks the command for a set of arguments
///
/// Priority:
/// 1. Example configuration (--config-example)
/// 2. Anomaly detection only (--anomalies-only)
/// 3. Full audit (default)
pub struct CommandRouter;

impl CommandRouter {
    pub fn route(args: Args) -> Result<Box<dyn Command>> {
        Self::validate_routing(&args)?;

        if args.config_example.is_some() {
            return Ok(Box::new(ConfigExampleCommand::new(args)));
        }

        if args.anomalies_only {
            return Ok(Box::new(AnomaliesCommand::new(args)));
        }

        Ok(Box::new(AuditCommand::new(args)))
    }

    /// Reject argument combinations that cannot be routed
    pub fn validate_routing(args: &Args) -> Result<()> {
        if args.config_example.is_some() && args.anomalies_only {
            return Err(PkiError::Other(
                "Cannot combine --config-example with --anomalies-only".to_string(),
            ));
        }

        if args.needs_sources() && args.sources.inventory.is_none() {
            return Err(PkiError::Other(
                "--inventory <FILE> is required to run an audit".to_string(),
            ));
        }

        Ok(())
    }
}
