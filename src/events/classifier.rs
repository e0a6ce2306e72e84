// Event Classifier - turns positional raw events into typed records

use super::schema::EventSchema;
use super::{
    CertificateIssued, CertificateRequest, ClassifiedEvent, EventType, KerberosRequest, RawEvent,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const TEMPLATE_ATTRIBUTE: &str = "CertificateTemplate:";

/// Why a recognised event could not be classified
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum EventRejection {
    #[error("{event_type} has {found} fields, layout needs {required}")]
    Truncated {
        event_type: EventType,
        required: usize,
        found: usize,
    },

    #[error("{event_type} has schema version {found}, classifier expects {expected}")]
    SchemaMismatch {
        event_type: EventType,
        expected: u32,
        found: u32,
    },

    #[error("{event_type} field '{field}' is malformed: {value:?}")]
    MalformedField {
        event_type: EventType,
        field: String,
        value: String,
    },
}

/// Outcome of classifying a batch of raw events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub events: Vec<ClassifiedEvent>,
    /// Events whose id is not one the classifier handles
    pub unrecognized: usize,
    pub rejected: Vec<EventRejection>,
}

impl ClassificationSummary {
    pub fn total(&self) -> usize {
        self.events.len() + self.unrecognized + self.rejected.len()
    }
}

/// Stateless classifier over a fixed field layout
#[derive(Debug, Clone, Default)]
pub struct EventClassifier {
    schema: EventSchema,
}

impl EventClassifier {
    pub fn new(schema: EventSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &EventSchema {
        &self.schema
    }

    /// Classify one event, dropping (and logging) anything malformed
    pub fn classify(&self, raw: &RawEvent) -> Option<ClassifiedEvent> {
        match self.try_classify(raw) {
            Ok(event) => event,
            Err(rejection) => {
                warn!(
                    source_host = %raw.source_host,
                    timestamp = %raw.timestamp,
                    "Dropping event: {}",
                    rejection
                );
                None
            }
        }
    }

    /// Classify one event, reporting why a recognised event was unusable.
    ///
    /// Unrecognised event ids are `Ok(None)`, not an error.
    pub fn try_classify(
        &self,
        raw: &RawEvent,
    ) -> std::result::Result<Option<ClassifiedEvent>, EventRejection> {
        let Some(event_type) = EventType::from_id(raw.event_type_id) else {
            debug!(event_id = raw.event_type_id, "Ignoring unrecognized event id");
            return Ok(None);
        };

        if let Some(found) = raw.event_version
            && found != self.schema.version
        {
            return Err(EventRejection::SchemaMismatch {
                event_type,
                expected: self.schema.version,
                found,
            });
        }

        let required = self.schema.required_fields(event_type);
        if raw.field_values.len() < required {
            return Err(EventRejection::Truncated {
                event_type,
                required,
                found: raw.field_values.len(),
            });
        }

        let fields = &raw.field_values;
        let event = match event_type {
            EventType::CertificateRequest => {
                let layout = &self.schema.certificate_request;
                ClassifiedEvent::CertificateRequest(CertificateRequest {
                    timestamp: raw.timestamp,
                    source_host: raw.source_host.clone(),
                    requester: fields[layout.requester].trim().to_string(),
                    template: template_name(&fields[layout.template]),
                    status: fields[layout.status].trim().to_string(),
                })
            }
            EventType::CertificateIssued => {
                let layout = &self.schema.certificate_issued;
                ClassifiedEvent::CertificateIssued(CertificateIssued {
                    timestamp: raw.timestamp,
                    source_host: raw.source_host.clone(),
                    requester: fields[layout.requester].trim().to_string(),
                    template: template_name(&fields[layout.template]),
                    serial_number: fields[layout.serial_number].trim().to_string(),
                })
            }
            EventType::KerberosTicketRequest => {
                let layout = &self.schema.kerberos_request;
                let raw_status = &fields[layout.status];
                let status =
                    parse_status(raw_status).ok_or_else(|| EventRejection::MalformedField {
                        event_type,
                        field: "status".to_string(),
                        value: raw_status.clone(),
                    })?;

                ClassifiedEvent::KerberosRequest(KerberosRequest {
                    timestamp: raw.timestamp,
                    source_host: raw.source_host.clone(),
                    user: fields[layout.user].trim().to_string(),
                    domain: fields[layout.domain].trim().to_string(),
                    ticket_options: fields[layout.ticket_options].trim().to_string(),
                    status,
                })
            }
        };

        Ok(Some(event))
    }

    /// Classify a batch, keeping counts of everything that was left out
    pub fn classify_all(&self, raws: &[RawEvent]) -> ClassificationSummary {
        let mut summary = ClassificationSummary::default();

        for raw in raws {
            match self.try_classify(raw) {
                Ok(Some(event)) => summary.events.push(event),
                Ok(None) => summary.unrecognized += 1,
                Err(rejection) => {
                    warn!(
                        source_host = %raw.source_host,
                        timestamp = %raw.timestamp,
                        "Dropping event: {}",
                        rejection
                    );
                    summary.rejected.push(rejection);
                }
            }
        }

        if !summary.rejected.is_empty() {
            warn!(
                dropped = summary.rejected.len(),
                total = raws.len(),
                "Some events could not be classified"
            );
        }

        summary
    }
}

/// Reduce a request-attribute blob to the template name.
///
/// 4886/4887 carry attributes like `CertificateTemplate:WebServer\nccm:host`;
/// plain values are returned trimmed.
fn template_name(value: &str) -> String {
    match value.find(TEMPLATE_ATTRIBUTE) {
        Some(pos) => value[pos + TEMPLATE_ATTRIBUTE.len()..]
            .split(|c: char| c == '\n' || c == '\r')
            .next()
            .unwrap_or("")
            .trim()
            .to_string(),
        None => value.trim().to_string(),
    }
}

/// Kerberos result codes arrive as `0x18` or as plain decimal
fn parse_status(value: &str) -> Option<u32> {
    let value = value.trim();
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}
