//! Outbound domain event seam.

use async_trait::async_trait;
use tokio::sync::Mutex;

use common::AppResult;
use domain::DomainEvent;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Hands saved aggregate events to an outbox or bus.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, events: Vec<DomainEvent>) -> AppResult<()>;
}

/// Publisher that only logs each event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) -> AppResult<()> {
        for event in &events {
            tracing::info!(
                event_id = %event.event_id,
                event_type = event.event_type(),
                aggregate_type = event.aggregate_type(),
                aggregate_id = %event.aggregate_id,
                tenant_id = %event.tenant_id,
                "Domain event"
            );
            if tracing::enabled!(tracing::Level::DEBUG) {
                match serde_json::to_string(&event.payload) {
                    Ok(payload) => tracing::debug!(event_id = %event.event_id, %payload, "Event payload"),
                    Err(e) => tracing::warn!(error = %e, "Event payload not serializable"),
                }
            }
        }
        Ok(())
    }
}

/// Publisher that keeps every event, for tests and the CLI demo.
#[derive(Debug, Default)]
pub struct InMemoryEventPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().await.clone()
    }

    pub async fn event_types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .await
            .iter()
            .map(DomainEvent::event_type)
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) -> AppResult<()> {
        self.events.lock().await.extend(events);
        Ok(())
    }
}

/// Publish after a save; a failed publish is logged, the save stands.
pub async fn publish_after_save(publisher: &dyn EventPublisher, events: Vec<DomainEvent>) {
    if events.is_empty() {
        return;
    }
    let count = events.len();
    if let Err(err) = publisher.publish(events).await {
        tracing::error!(error = %err, count, "Failed to publish domain events");
    }
}
