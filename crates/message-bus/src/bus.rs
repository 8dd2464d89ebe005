//! Producer-side API for publishing domain events.

use std::sync::Arc;

use async_trait::async_trait;
use domain::DomainEvent;
use tokio_util::sync::CancellationToken;

use crate::error::PublishError;
use crate::queue::BoundedEventQueue;

/// Trait for anything that accepts domain events for asynchronous dispatch.
///
/// Publishing returns once the event is queued, never after handling.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Queues one event, waiting while the queue is full.
    async fn publish(
        &self,
        event: Arc<dyn DomainEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), PublishError>;
}

/// Publishes domain events onto the shared bounded queue.
///
/// Cheap to clone; every clone feeds the same queue.
#[derive(Debug, Clone)]
pub struct EventBus {
    queue: BoundedEventQueue,
}

impl EventBus {
    pub fn new(queue: BoundedEventQueue) -> Self {
        Self { queue }
    }

    /// Publishes a concrete event.
    pub async fn publish_event<E: DomainEvent>(
        &self,
        event: E,
        cancel: &CancellationToken,
    ) -> Result<(), PublishError> {
        self.publish(Arc::new(event), cancel).await
    }

    pub fn queue(&self) -> &BoundedEventQueue {
        &self.queue
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    #[tracing::instrument(skip_all, fields(event_type = event.event_type()))]
    async fn publish(
        &self,
        event: Arc<dyn DomainEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), PublishError> {
        let event_type = event.event_type();

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(PublishError::Cancelled),
            queued = self.queue.enqueue(event) => queued.map_err(PublishError::from),
        };

        match &result {
            Ok(()) => {
                metrics::counter!("domain_events_published_total", "event_type" => event_type)
                    .increment(1);
                tracing::debug!("domain event queued");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to publish domain event");
            }
        }
        result
    }
}
