// PKIWatch - PKI health, compliance and anomaly auditing
// Copyright (C) 2025 PKIWatch Team
// Licensed under GPL-3.0
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

use anyhow::Result;
use clap::Parser;
use pkiwatch::Args;
use pkiwatch::commands::CommandRouter;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging - respect RUST_LOG environment variable, --verbose wins
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        std::env::var("RUST_LOG")
            .ok()
            .and_then(|s| s.parse::<Level>().ok())
            .unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let command = CommandRouter::route(args)?;
    debug!("Executing {}", command.name());
    command.execute().await?;

    Ok(())
}
