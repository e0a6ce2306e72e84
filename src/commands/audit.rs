// AuditCommand - Full health, compliance and security audit
// Copyright (C) 2025 PKIWatch Team
// Licensed under GPL-3.0

use super::{Command, build_auditor};
use crate::output::{json, terminal};
use crate::{Args, Result};
use async_trait::async_trait;
use tracing::info;

/// Runs a full audit and prints or exports the `HealthReport`
pub struct AuditCommand {
    args: Args,
}

impl AuditCommand {
    pub fn new(args: Args) -> Self {
        Self { args }
    }
}

#[async_trait]
impl Command for AuditCommand {
    async fn execute(&self) -> Result<()> {
        let auditor = build_auditor(&self.args)?;
        let report = auditor.run().await?;

        if !self.args.output.quiet {
            terminal::print_report(&report);
        }

        if let Some(path) = &self.args.output.output {
            json::write_json_file("HealthReport", &report, path, self.args.output.pretty)?;
            info!("Report exported to {}", path.display());
            println!("✓ Report saved to: {}", path.display());
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "AuditCommand"
    }
}
