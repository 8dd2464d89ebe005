//! Domain event handler trait and the type-erased adapter used for dispatch.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use domain::DomainEvent;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;

/// Trait for domain event handlers.
///
/// A handler subscribes to exactly one event type `E`. The same handler type
/// may implement the trait for several event types and be registered once
/// per type.
///
/// Handlers run concurrently with handlers of other events and must honor
/// the cancellation token at their suspension points.
#[async_trait]
pub trait DomainEventHandler<E: DomainEvent>: Send + Sync {
    /// Returns the handler name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Handles a single event.
    async fn handle(&self, event: &E, cancel: &CancellationToken) -> Result<(), HandlerError>;
}

/// Object-safe view of a handler, keyed by the runtime event type.
#[async_trait]
pub(crate) trait ErasedHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        event: &dyn DomainEvent,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError>;
}

/// Adapts a `DomainEventHandler<E>` to [`ErasedHandler`].
pub(crate) struct TypedHandler<E, H> {
    handler: Arc<H>,
    _event: PhantomData<fn(&E)>,
}

impl<E, H> TypedHandler<E, H> {
    pub(crate) fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<E, H> ErasedHandler for TypedHandler<E, H>
where
    E: DomainEvent,
    H: DomainEventHandler<E> + 'static,
{
    fn name(&self) -> &'static str {
        <H as DomainEventHandler<E>>::name(&self.handler)
    }

    async fn handle(
        &self,
        event: &dyn DomainEvent,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError> {
        let typed = event
            .downcast_ref::<E>()
            .ok_or_else(|| HandlerError::EventTypeMismatch {
                expected: std::any::type_name::<E>(),
                actual: event.event_type(),
            })?;
        <H as DomainEventHandler<E>>::handle(&self.handler, typed, cancel).await
    }
}

/// Handler that logs every event it receives.
///
/// Registering it for an event type guarantees that type always has at
/// least one subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainEventLogger;

#[async_trait]
impl<E: DomainEvent> DomainEventHandler<E> for DomainEventLogger {
    fn name(&self) -> &'static str {
        "DomainEventLogger"
    }

    async fn handle(&self, event: &E, _cancel: &CancellationToken) -> Result<(), HandlerError> {
        tracing::info!(
            event_type = event.event_type(),
            event = ?event,
            "Domain event issued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Pinged;

    impl DomainEvent for Pinged {
        fn event_type(&self) -> &'static str {
            "Pinged"
        }
    }

    #[derive(Debug)]
    struct Ponged;

    impl DomainEvent for Ponged {
        fn event_type(&self) -> &'static str {
            "Ponged"
        }
    }

    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DomainEventHandler<Pinged> for CountingHandler {
        async fn handle(&self, _event: &Pinged, _cancel: &CancellationToken) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_typed_handler_downcasts() {
        let handler = Arc::new(CountingHandler::default());
        let erased: TypedHandler<Pinged, _> = TypedHandler::new(Arc::clone(&handler));
        let cancel = CancellationToken::new();

        erased.handle(&Pinged, &cancel).await.unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert!(erased.name().ends_with("CountingHandler"));
    }

    #[tokio::test]
    async fn test_typed_handler_rejects_other_event_types() {
        let erased: TypedHandler<Pinged, _> =
            TypedHandler::new(Arc::new(CountingHandler::default()));

        let result = erased.handle(&Ponged, &CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(HandlerError::EventTypeMismatch {
                actual: "Ponged",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_logger_accepts_any_event() {
        let cancel = CancellationToken::new();

        DomainEventHandler::<Pinged>::handle(&DomainEventLogger, &Pinged, &cancel)
            .await
            .unwrap();
        DomainEventHandler::<Ponged>::handle(&DomainEventLogger, &Ponged, &cancel)
            .await
            .unwrap();
    }
}
