//! In-process event bus.
//!
//! Services publish [`DomainEvent`]s without waiting on delivery. A single
//! dispatcher task drains the channel and hands each event to the webhook
//! service. Delivery is best effort: a full or closed channel drops the
//! event with a warning.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::db::DbPool;
use crate::models::event::DomainEvent;
use crate::services::webhook_service;

/// Receiving half handed to [`spawn_dispatcher`].
pub type EventReceiver = mpsc::Receiver<DomainEvent>;

/// Cloneable publishing handle stored in the application state.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: mpsc::Sender<DomainEvent>,
}

impl EventBus {
    /// Create a bus with a bounded buffer of `capacity` events.
    pub fn new(capacity: usize) -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Queue an event for delivery. Never blocks and never fails the caller.
    pub fn publish(&self, event: DomainEvent) {
        let event_type = event.event_type;
        match self.sender.try_send(event) {
            Ok(()) => tracing::debug!(event_type = event_type.as_str(), "Event published"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    event_type = event_type.as_str(),
                    "Event bus full, dropping event"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(
                    event_type = event_type.as_str(),
                    "Event bus closed, dropping event"
                );
            }
        }
    }
}

/// Start the background task that fans events out to webhooks.
///
/// The task ends once every [`EventBus`] clone has been dropped.
pub fn spawn_dispatcher(
    pool: DbPool,
    mut receiver: EventReceiver,
    webhook_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = match reqwest::Client::builder().timeout(webhook_timeout).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::error!("Failed to build webhook HTTP client: {}", e);
                return;
            }
        };

        while let Some(event) = receiver.recv().await {
            if let Err(e) = webhook_service::dispatch_event(&pool, &client, &event).await {
                tracing::error!(
                    event_id = %event.id,
                    event_type = event.event_type.as_str(),
                    "Failed to dispatch event: {:?}",
                    e
                );
            }
        }

        tracing::info!("Event dispatcher stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::EventType;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn published_events_reach_the_receiver_in_order() {
        let (bus, mut receiver) = EventBus::new(4);
        let tenant = Uuid::new_v4();

        bus.publish(DomainEvent::new(tenant, EventType::CustomerCreated, json!({"n": 1})));
        bus.publish(DomainEvent::new(tenant, EventType::CustomerUpdated, json!({"n": 2})));

        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        assert_eq!(first.event_type, EventType::CustomerCreated);
        assert_eq!(second.event_type, EventType::CustomerUpdated);
        assert_eq!(second.api_key_id, tenant);
    }

    #[tokio::test]
    async fn full_bus_drops_instead_of_blocking() {
        let (bus, mut receiver) = EventBus::new(1);
        let tenant = Uuid::new_v4();

        bus.publish(DomainEvent::new(tenant, EventType::InvoicePaid, json!({})));
        bus.publish(DomainEvent::new(tenant, EventType::InvoiceIssued, json!({})));
        drop(bus);

        assert_eq!(receiver.recv().await.unwrap().event_type, EventType::InvoicePaid);
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn publishing_after_receiver_dropped_is_harmless() {
        let (bus, receiver) = EventBus::new(1);
        drop(receiver);
        bus.publish(DomainEvent::new(Uuid::new_v4(), EventType::RiskAssessed, json!({})));
    }
}
