//! Handler registration and per-event handler scopes.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use domain::DomainEvent;

use crate::error::{DispatchError, HandlerError};
use crate::handler::{DomainEventHandler, ErasedHandler, TypedHandler};

type HandlerFactory = Arc<dyn Fn() -> Result<Box<dyn ErasedHandler>, HandlerError> + Send + Sync>;

struct Registration {
    handler_name: &'static str,
    factory: HandlerFactory,
}

/// Maps event types to the handlers subscribed to them.
///
/// Built once at startup and shared read-only with the processor.
/// Registration order is the order in which a scope yields its handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    registrations: HashMap<TypeId, Vec<Registration>>,
    next_scope_id: AtomicU64,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one handler instance shared by every dispatch of `E`.
    pub fn register<E, H>(&mut self, handler: H) -> &mut Self
    where
        E: DomainEvent,
        H: DomainEventHandler<E> + 'static,
    {
        let handler = Arc::new(handler);
        let handler_name = <H as DomainEventHandler<E>>::name(&handler);
        let factory: HandlerFactory = Arc::new(move || {
            Ok(Box::new(TypedHandler::<E, H>::new(Arc::clone(&handler))) as Box<dyn ErasedHandler>)
        });
        self.push::<E>(handler_name, factory)
    }

    /// Registers a factory building a fresh handler for every dispatch of `E`.
    ///
    /// A factory error is a dispatch fault: it aborts that event's dispatch
    /// and is logged by the processor.
    pub fn register_scoped<E, H, F>(&mut self, factory: F) -> &mut Self
    where
        E: DomainEvent,
        H: DomainEventHandler<E> + 'static,
        F: Fn() -> Result<H, HandlerError> + Send + Sync + 'static,
    {
        let handler_name = std::any::type_name::<H>();
        let factory: HandlerFactory = Arc::new(move || {
            let handler = factory()?;
            Ok(Box::new(TypedHandler::<E, H>::new(Arc::new(handler))) as Box<dyn ErasedHandler>)
        });
        self.push::<E>(handler_name, factory)
    }

    /// Returns the number of handlers registered for `E`.
    pub fn handler_count<E: DomainEvent>(&self) -> usize {
        self.registrations
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }

    /// Builds the handlers subscribed to the event's runtime type.
    ///
    /// An event type with no registrations yields an empty scope.
    pub fn create_scope(&self, event: &dyn DomainEvent) -> Result<HandlerScope, DispatchError> {
        let id = self.next_scope_id.fetch_add(1, Ordering::Relaxed);
        let registrations = self
            .registrations
            .get(&event.type_key())
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut handlers = Vec::with_capacity(registrations.len());
        for registration in registrations {
            let handler =
                (registration.factory)().map_err(|source| DispatchError::ScopeCreation {
                    event_type: event.event_type(),
                    handler: registration.handler_name,
                    source,
                })?;
            handlers.push(handler);
        }

        tracing::trace!(scope_id = id, handler_count = handlers.len(), "handler scope created");
        Ok(HandlerScope { id, handlers })
    }

    fn push<E: DomainEvent>(&mut self, handler_name: &'static str, factory: HandlerFactory) -> &mut Self {
        tracing::debug!(
            handler = handler_name,
            event_type = std::any::type_name::<E>(),
            "registered domain event handler"
        );
        self.registrations
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Registration {
                handler_name,
                factory,
            });
        self
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("event_types", &self.registrations.len())
            .finish()
    }
}

/// The handler instances resolved for one event.
///
/// Lives exactly as long as that event's dispatch; dropping the scope
/// releases any per-event handler instances.
pub struct HandlerScope {
    id: u64,
    handlers: Vec<Box<dyn ErasedHandler>>,
}

impl HandlerScope {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler names in dispatch order.
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|handler| handler.name()).collect()
    }

    pub(crate) fn handlers(&self) -> &[Box<dyn ErasedHandler>] {
        &self.handlers
    }
}

impl Drop for HandlerScope {
    fn drop(&mut self) {
        tracing::trace!(scope_id = self.id, "handler scope disposed");
    }
}

impl std::fmt::Debug for HandlerScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerScope")
            .field("id", &self.id)
            .field("handlers", &self.handler_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio_util::sync::CancellationToken;

    #[derive(Debug)]
    struct Opened;

    impl DomainEvent for Opened {
        fn event_type(&self) -> &'static str {
            "Opened"
        }
    }

    #[derive(Debug)]
    struct Closed;

    impl DomainEvent for Closed {
        fn event_type(&self) -> &'static str {
            "Closed"
        }
    }

    struct Recorder {
        name: &'static str,
    }

    #[async_trait]
    impl DomainEventHandler<Opened> for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn handle(&self, _event: &Opened, _cancel: &CancellationToken) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn test_scope_yields_handlers_in_registration_order() {
        let mut registry = HandlerRegistry::new();
        registry
            .register::<Opened, _>(Recorder { name: "first" })
            .register::<Opened, _>(Recorder { name: "second" });

        let scope = registry.create_scope(&Opened).unwrap();

        assert_eq!(scope.handler_names(), vec!["first", "second"]);
        assert_eq!(registry.handler_count::<Opened>(), 2);
    }

    #[test]
    fn test_unsubscribed_event_gets_empty_scope() {
        let mut registry = HandlerRegistry::new();
        registry.register::<Opened, _>(Recorder { name: "only" });

        let scope = registry.create_scope(&Closed).unwrap();

        assert!(scope.is_empty());
        assert_eq!(registry.handler_count::<Closed>(), 0);
    }

    #[test]
    fn test_scoped_factory_runs_per_scope() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let mut registry = HandlerRegistry::new();
        registry.register_scoped::<Opened, _, _>(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Recorder { name: "scoped" })
        });

        let first = registry.create_scope(&Opened).unwrap();
        let second = registry.create_scope(&Opened).unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_factory_failure_is_scope_creation_error() {
        let mut registry = HandlerRegistry::new();
        registry.register_scoped::<Opened, Recorder, _>(|| {
            Err(HandlerError::Construction("no connection".to_string()))
        });

        let error = registry.create_scope(&Opened).unwrap_err();

        let DispatchError::ScopeCreation {
            event_type,
            handler,
            ..
        } = error;
        assert_eq!(event_type, "Opened");
        assert!(handler.ends_with("Recorder"));
    }
}
