// Command trait - Defines the interface for all command implementations
// Copyright (C) 2025 PKIWatch Team
// Licensed under GPL-3.0

use crate::Result;
use async_trait::async_trait;

/// One operational mode of the CLI
///
/// Each command validates its own preconditions, runs, and prints or exports
/// its result.
#[async_trait]
pub trait Command: Send + Sync {
    /// Execute the command asynchronously
    async fn execute(&self) -> Result<()>;

    /// Get a human-readable name for this command (for logging/debugging)
    fn name(&self) -> &'static str;
}
