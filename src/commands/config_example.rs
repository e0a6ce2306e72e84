// ConfigExampleCommand - Write a default configuration file
// Copyright (C) 2025 PKIWatch Team
// Licensed under GPL-3.0

use super::Command;
use crate::config::AuditConfig;
use crate::{Args, Result};
use async_trait::async_trait;

/// Writes the built-in defaults as a TOML file
pub struct ConfigExampleCommand {
    args: Args,
}

impl ConfigExampleCommand {
    pub fn new(args: Args) -> Self {
        Self { args }
    }
}

#[async_trait]
impl Command for ConfigExampleCommand {
    async fn execute(&self) -> Result<()> {
        if let Some(path) = &self.args.config_example {
            AuditConfig::create_example(path)?;
            println!("✓ Example configuration saved to: {}", path.display());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ConfigExampleCommand"
    }
}
