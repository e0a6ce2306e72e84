// Audit events - raw records from the CA/DC security log and their typed forms

pub mod classifier;
pub mod schema;

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};

pub use classifier::{ClassificationSummary, EventClassifier, EventRejection};
pub use schema::EventSchema;

/// Event identifiers the classifier understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    /// 4886 - Certificate Services received a certificate request
    CertificateRequest,
    /// 4887 - Certificate Services approved a request and issued a certificate
    CertificateIssued,
    /// 4768 - A Kerberos authentication ticket (TGT) was requested
    KerberosTicketRequest,
}

impl EventType {
    pub const ALL: [EventType; 3] = [
        EventType::CertificateRequest,
        EventType::CertificateIssued,
        EventType::KerberosTicketRequest,
    ];

    /// Map a Windows event id to a known type; anything else is `None`
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            4886 => Some(EventType::CertificateRequest),
            4887 => Some(EventType::CertificateIssued),
            4768 => Some(EventType::KerberosTicketRequest),
            _ => None,
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            EventType::CertificateRequest => 4886,
            EventType::CertificateIssued => 4887,
            EventType::KerberosTicketRequest => 4768,
        }
    }

    /// All ids, in the form the event source query expects
    pub fn all_ids() -> Vec<u32> {
        Self::ALL.iter().map(|t| t.id()).collect()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::CertificateRequest => write!(f, "CertificateRequest(4886)"),
            EventType::CertificateIssued => write!(f, "CertificateIssued(4887)"),
            EventType::KerberosTicketRequest => write!(f, "KerberosTicketRequest(4768)"),
        }
    }
}

/// One record as returned by the event source. Never modified after reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event time in the recording host's local offset
    pub timestamp: DateTime<FixedOffset>,
    pub event_type_id: u32,
    /// Version of the event's field layout, when the source reports one
    #[serde(default)]
    pub event_version: Option<u32>,
    pub source_host: String,
    pub principal_id: String,
    /// Positional insertion strings
    pub field_values: Vec<String>,
}

/// Certificate request received by the CA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateRequest {
    pub timestamp: DateTime<FixedOffset>,
    pub source_host: String,
    pub requester: String,
    pub template: String,
    pub status: String,
}

/// Certificate issued by the CA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateIssued {
    pub timestamp: DateTime<FixedOffset>,
    pub source_host: String,
    pub requester: String,
    pub template: String,
    pub serial_number: String,
}

/// Kerberos TGT request seen by a domain controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KerberosRequest {
    pub timestamp: DateTime<FixedOffset>,
    pub source_host: String,
    pub user: String,
    pub domain: String,
    pub ticket_options: String,
    /// Kerberos result code; 0 is success
    pub status: u32,
}

impl KerberosRequest {
    pub fn is_failure(&self) -> bool {
        self.status != 0
    }
}

/// Typed form of a recognised raw event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClassifiedEvent {
    CertificateRequest(CertificateRequest),
    CertificateIssued(CertificateIssued),
    KerberosRequest(KerberosRequest),
}

impl ClassifiedEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            ClassifiedEvent::CertificateRequest(_) => EventType::CertificateRequest,
            ClassifiedEvent::CertificateIssued(_) => EventType::CertificateIssued,
            ClassifiedEvent::KerberosRequest(_) => EventType::KerberosTicketRequest,
        }
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        match self {
            ClassifiedEvent::CertificateRequest(e) => e.timestamp,
            ClassifiedEvent::CertificateIssued(e) => e.timestamp,
            ClassifiedEvent::KerberosRequest(e) => e.timestamp,
        }
    }

    /// Hour of day in the event's own offset
    pub fn local_hour(&self) -> u32 {
        self.timestamp().hour()
    }
}

/// Hour bucket key for a timestamp: the UTC instant truncated to the hour.
///
/// Events recorded under different offsets share a bucket only when they fall
/// in the same real hour.
pub fn hour_bucket(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp
        .with_timezone(&Utc)
        .format("%Y-%m-%d %H:00")
        .to_string()
}
