// Event field layouts
//
// Positional offsets into RawEvent::field_values, per event type. The offsets
// are a contract with the upstream audit export and are overridable from the
// configuration when a different schema version is deployed.

use super::EventType;
use crate::Result;
use crate::error::PkiError;
use serde::{Deserialize, Serialize};

/// Offsets for 4886 certificate requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRequestLayout {
    pub requester: usize,
    pub template: usize,
    pub status: usize,
}

/// Offsets for 4887 certificate issuance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateIssuedLayout {
    pub requester: usize,
    pub template: usize,
    pub serial_number: usize,
}

/// Offsets for 4768 Kerberos TGT requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KerberosRequestLayout {
    pub user: usize,
    pub domain: usize,
    pub ticket_options: usize,
    pub status: usize,
}

/// Versioned map from event type to field layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSchema {
    /// Layout version; events that declare a different version are rejected
    pub version: u32,
    pub certificate_request: CertificateRequestLayout,
    pub certificate_issued: CertificateIssuedLayout,
    pub kerberos_request: KerberosRequestLayout,
}

impl Default for EventSchema {
    fn default() -> Self {
        Self::v1()
    }
}

impl EventSchema {
    /// Layout version 1
    pub fn v1() -> Self {
        Self {
            version: 1,
            certificate_request: CertificateRequestLayout {
                requester: 1,
                template: 2,
                status: 3,
            },
            certificate_issued: CertificateIssuedLayout {
                requester: 1,
                template: 2,
                serial_number: 3,
            },
            kerberos_request: KerberosRequestLayout {
                user: 0,
                domain: 1,
                ticket_options: 5,
                status: 6,
            },
        }
    }

    fn offsets(&self, event_type: EventType) -> Vec<usize> {
        match event_type {
            EventType::CertificateRequest => {
                let l = &self.certificate_request;
                vec![l.requester, l.template, l.status]
            }
            EventType::CertificateIssued => {
                let l = &self.certificate_issued;
                vec![l.requester, l.template, l.serial_number]
            }
            EventType::KerberosTicketRequest => {
                let l = &self.kerberos_request;
                vec![l.user, l.domain, l.ticket_options, l.status]
            }
        }
    }

    /// Minimum number of positional fields an event of this type must carry
    pub fn required_fields(&self, event_type: EventType) -> usize {
        self.offsets(event_type)
            .into_iter()
            .max()
            .map(|m| m + 1)
            .unwrap_or(0)
    }

    /// Reject layouts that map two fields of the same event to one offset
    pub fn validate(&self) -> Result<()> {
        if self.version == 0 {
            return Err(PkiError::ConfigInvalid {
                message: "schema.version must be at least 1".to_string(),
            });
        }

        for event_type in EventType::ALL {
            let mut offsets = self.offsets(event_type);
            let total = offsets.len();
            offsets.sort_unstable();
            offsets.dedup();
            if offsets.len() != total {
                return Err(PkiError::ConfigInvalid {
                    message: format!("schema layout for {} reuses a field offset", event_type),
                });
            }
        }

        Ok(())
    }
}
