// JSON Output Module
//
// Every exported document is wrapped in the same envelope:
// `{ "metadata": { "type", "timestamp", "version" }, "data": ... }`

use crate::Result;
use crate::error::PkiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Envelope header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMetadata {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// A document ready for export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub metadata: ExportMetadata,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    /// Wrap `data`, stamped with the current time and crate version
    pub fn new(kind: &str, data: T) -> Self {
        Self::at(kind, data, Utc::now())
    }

    pub fn at(kind: &str, data: T, timestamp: DateTime<Utc>) -> Self {
        Self {
            metadata: ExportMetadata {
                kind: kind.to_string(),
                timestamp,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            data,
        }
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        if pretty {
            Ok(serde_json::to_string_pretty(self)?)
        } else {
            Ok(serde_json::to_string(self)?)
        }
    }
}

/// Generate an enveloped JSON document
pub fn generate_json<T: Serialize>(kind: &str, data: &T, pretty: bool) -> Result<String> {
    Envelope::new(kind, data).to_json(pretty)
}

/// Write an enveloped JSON document to file
pub fn write_json_file<T: Serialize>(
    kind: &str,
    data: &T,
    path: &Path,
    pretty: bool,
) -> Result<()> {
    let json = generate_json(kind, data, pretty)?;
    std::fs::write(path, json).map_err(|e| PkiError::FileSystem {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(())
}
