// Output configuration arguments
// Copyright (C) 2025 PKIWatch Team
// Licensed under GPL-3.0

use clap::Args;
use std::path::PathBuf;

/// Output and export options
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Export the result as an enveloped JSON document
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Pretty print JSON output
    #[arg(long = "pretty")]
    pub pretty: bool,

    /// Do not print the terminal summary
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}
