// Error types for pkiwatch
//
// Recoverable per-item failures (a collaborator that is down, a probe that timed
// out) are folded into the affected snapshot slot or check result by the caller.
// Only configuration failures and contract violations abort a whole run.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Main error type for pkiwatch operations
#[derive(Debug, Error)]
pub enum PkiError {
    /// Configuration could not be obtained at all
    #[error("Configuration unavailable: {details}")]
    ConfigUnavailable { details: String },

    /// Configuration was read but is not usable
    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    /// A collaborator (directory, event log, registry, responder...) could not be reached
    #[error("Data source '{source_name}' unavailable: {details}")]
    SourceUnavailable {
        source_name: String,
        details: String,
    },

    /// A bounded operation exceeded its timeout
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// A check name that is not part of the requested battery
    #[error("Unknown {kind} check: {name}")]
    UnknownCheck { kind: String, name: String },

    /// File system errors with the offending path
    #[error("File system error: {path}: {source}")]
    FileSystem {
        path: String,
        #[source]
        source: io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse errors
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl PkiError {
    /// Shorthand for a collaborator failure
    pub fn unavailable(source_name: impl Into<String>, details: impl Into<String>) -> Self {
        PkiError::SourceUnavailable {
            source_name: source_name.into(),
            details: details.into(),
        }
    }

    /// Whether this error must abort the whole evaluation.
    ///
    /// Configuration failures and contract violations are fatal. Everything else
    /// degrades a single result slot.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PkiError::ConfigUnavailable { .. }
                | PkiError::ConfigInvalid { .. }
                | PkiError::UnknownCheck { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = PkiError::Timeout {
            operation: "OCSP probe".to_string(),
            duration: Duration::from_secs(5),
        };

        let msg = err.to_string();
        assert!(msg.contains("OCSP probe"));
        assert!(msg.contains("timed out"));
    }

    #[test]
    fn test_source_unavailable_message() {
        let err = PkiError::unavailable("AuthorityDirectory", "LDAP bind failed");
        let msg = err.to_string();
        assert!(msg.contains("AuthorityDirectory"));
        assert!(msg.contains("LDAP bind failed"));
    }

    #[test]
    fn test_fatality() {
        assert!(
            PkiError::ConfigUnavailable {
                details: "missing".to_string()
            }
            .is_fatal()
        );
        assert!(
            PkiError::UnknownCheck {
                kind: "compliance".to_string(),
                name: "Nope".to_string()
            }
            .is_fatal()
        );
        assert!(!PkiError::unavailable("EventSource", "down").is_fatal());
    }

    #[test]
    fn test_error_chain_preserved() {
        use std::error::Error;

        let err = PkiError::FileSystem {
            path: "/etc/pkiwatch.toml".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.source().is_some());
    }
}
