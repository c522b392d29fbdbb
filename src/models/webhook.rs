//! Webhook subscriptions, their delivery log and the signed payload.
//!
//! The signing secret is handed out once, at registration. Receivers check
//! `X-Webhook-Signature` against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::event::{DomainEvent, EventType};

/// Row of `webhook_endpoints`. The secret stays in plaintext because every
/// delivery is signed with it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookEndpoint {
    pub id: Uuid,
    pub api_key_id: Uuid,
    pub url: String,
    pub secret: String,
    /// Subscribed event names; empty means every event.
    pub event_types: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl WebhookEndpoint {
    pub fn is_subscribed_to(&self, event_type: EventType) -> bool {
        self.event_types.is_empty() || self.event_types.iter().any(|t| t == event_type.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookEndpointRequest {
    pub url: String,

    #[serde(default)]
    pub event_types: Vec<String>,
}

/// Endpoint as returned by the API; `secret` only on registration.
#[derive(Debug, Serialize)]
pub struct WebhookEndpointResponse {
    pub id: Uuid,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub event_types: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<WebhookEndpoint> for WebhookEndpointResponse {
    fn from(endpoint: WebhookEndpoint) -> Self {
        Self {
            id: endpoint.id,
            url: endpoint.url,
            secret: None,
            event_types: endpoint.event_types,
            is_active: endpoint.is_active,
            created_at: endpoint.created_at,
        }
    }
}

impl WebhookEndpointResponse {
    pub fn with_secret(mut self, secret: String) -> Self {
        self.secret = Some(secret);
        self
    }
}

/// One delivery attempt from `webhook_events`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub webhook_endpoint_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub sent_at: DateTime<Utc>,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
}

/// Body POSTed to subscribers.
///
/// ```json
/// {
///   "event_id": "550e8400-e29b-41d4-a716-446655440000",
///   "event_type": "invoice.paid",
///   "created_at": "2025-01-15T10:30:00Z",
///   "data": { "invoice_id": "...", "total_cents": 119000 }
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub created_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl From<&DomainEvent> for WebhookPayload {
    fn from(event: &DomainEvent) -> Self {
        Self {
            event_id: event.id,
            event_type: event.event_type,
            created_at: event.occurred_at,
            data: event.data.clone(),
        }
    }
}
