//! Domain events published by the services and fanned out to webhooks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every event type a webhook endpoint can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "customer.created")]
    CustomerCreated,
    #[serde(rename = "customer.updated")]
    CustomerUpdated,
    #[serde(rename = "customer.deleted")]
    CustomerDeleted,
    #[serde(rename = "journal.posted")]
    JournalPosted,
    #[serde(rename = "invoice.issued")]
    InvoiceIssued,
    #[serde(rename = "invoice.payment_recorded")]
    InvoicePaymentRecorded,
    #[serde(rename = "invoice.paid")]
    InvoicePaid,
    #[serde(rename = "invoice.cancelled")]
    InvoiceCancelled,
    #[serde(rename = "match.exception")]
    MatchException,
    #[serde(rename = "risk.assessed")]
    RiskAssessed,
    #[serde(rename = "edi.received")]
    EdiReceived,
    #[serde(rename = "punchout.order_submitted")]
    PunchOutOrderSubmitted,
    #[serde(rename = "sync_job.completed")]
    SyncJobCompleted,
    #[serde(rename = "sync_job.failed")]
    SyncJobFailed,
}

impl EventType {
    pub const ALL: [EventType; 14] = [
        EventType::CustomerCreated,
        EventType::CustomerUpdated,
        EventType::CustomerDeleted,
        EventType::JournalPosted,
        EventType::InvoiceIssued,
        EventType::InvoicePaymentRecorded,
        EventType::InvoicePaid,
        EventType::InvoiceCancelled,
        EventType::MatchException,
        EventType::RiskAssessed,
        EventType::EdiReceived,
        EventType::PunchOutOrderSubmitted,
        EventType::SyncJobCompleted,
        EventType::SyncJobFailed,
    ];

    /// Dotted wire name, as stored in `webhook_endpoints.event_types`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CustomerCreated => "customer.created",
            EventType::CustomerUpdated => "customer.updated",
            EventType::CustomerDeleted => "customer.deleted",
            EventType::JournalPosted => "journal.posted",
            EventType::InvoiceIssued => "invoice.issued",
            EventType::InvoicePaymentRecorded => "invoice.payment_recorded",
            EventType::InvoicePaid => "invoice.paid",
            EventType::InvoiceCancelled => "invoice.cancelled",
            EventType::MatchException => "match.exception",
            EventType::RiskAssessed => "risk.assessed",
            EventType::EdiReceived => "edi.received",
            EventType::PunchOutOrderSubmitted => "punchout.order_submitted",
            EventType::SyncJobCompleted => "sync_job.completed",
            EventType::SyncJobFailed => "sync_job.failed",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

/// Something that happened inside one business's data.
#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    pub id: Uuid,
    /// Business the event belongs to; only its webhooks receive it.
    #[serde(skip)]
    pub api_key_id: Uuid,
    pub event_type: EventType,
    pub occurred_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl DomainEvent {
    pub fn new(api_key_id: Uuid, event_type: EventType, data: impl Serialize) -> Self {
        Self {
            id: Uuid::new_v4(),
            api_key_id,
            event_type,
            occurred_at: Utc::now(),
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_serde_names() {
        for event_type in EventType::ALL {
            let json = serde_json::to_value(event_type).unwrap();
            assert_eq!(json, serde_json::Value::String(event_type.as_str().into()));
            assert_eq!(EventType::parse(event_type.as_str()), Some(event_type));
        }
    }

    #[test]
    fn unknown_names_do_not_parse() {
        assert_eq!(EventType::parse("invoice.deleted"), None);
    }
}
