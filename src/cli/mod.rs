// CLI module - Command line interface and argument parsing
// Copyright (C) 2025 PKIWatch Team
// Licensed under GPL-3.0

use clap::Parser;
use std::path::PathBuf;

mod output_args;
mod source_args;

pub use output_args::OutputArgs;
pub use source_args::SourceArgs;

/// PKIWatch - AD CS health, compliance and anomaly auditing
///
/// Composes the domain-specific argument groups with `#[command(flatten)]`:
/// - Data sources and configuration (SourceArgs)
/// - Output and export (OutputArgs)
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version)]
#[command(name = "pkiwatch")]
#[command(about = "PKI health, compliance and anomaly auditor", long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub sources: SourceArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Only pull the event window and report anomalies
    #[arg(long = "anomalies-only")]
    pub anomalies_only: bool,

    /// Write an example configuration file and exit
    #[arg(long = "config-example", value_name = "FILE")]
    pub config_example: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Args {
    /// True when the run needs collaborator data
    pub fn needs_sources(&self) -> bool {
        self.config_example.is_none()
    }
}
