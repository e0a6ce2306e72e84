// Data source and configuration arguments
// Copyright (C) 2025 PKIWatch Team
// Licensed under GPL-3.0

use clap::Args;
use std::path::PathBuf;

/// Where collaborator data and thresholds come from
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// JSON inventory captured from the PKI estate
    #[arg(short = 'i', long = "inventory", value_name = "FILE")]
    pub inventory: Option<PathBuf>,

    /// TOML configuration file (built-in defaults when omitted)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}
