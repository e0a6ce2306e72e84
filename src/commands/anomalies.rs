// AnomaliesCommand - Event window anomaly detection only
// Copyright (C) 2025 PKIWatch Team
// Licensed under GPL-3.0

use super::{Command, build_auditor};
use crate::output::{json, terminal};
use crate::{Args, Result};
use async_trait::async_trait;

/// Pulls the event window, classifies it and reports anomalies
pub struct AnomaliesCommand {
    args: Args,
}

impl AnomaliesCommand {
    pub fn new(args: Args) -> Self {
        Self { args }
    }
}

#[async_trait]
impl Command for AnomaliesCommand {
    async fn execute(&self) -> Result<()> {
        let auditor = build_auditor(&self.args)?;
        let report = auditor.detect_anomalies().await?;

        if !self.args.output.quiet {
            terminal::print_anomaly_report(&report);
        }

        if let Some(path) = &self.args.output.output {
            json::write_json_file("Anomalies", &report, path, self.args.output.pretty)?;
            println!("✓ Anomalies saved to: {}", path.display());
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "AnomaliesCommand"
    }
}
