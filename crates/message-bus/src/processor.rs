//! The single consumer loop that fans queued events out to their handlers.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use domain::DomainEvent;
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::queue::QueueReader;
use crate::registry::HandlerRegistry;

/// Counts reported when the dispatch loop returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingSummary {
    /// Events taken from the queue and handed to a dispatch task.
    pub events_dequeued: u64,
    /// True if the loop stopped because of cancellation rather than drain.
    pub cancelled: bool,
}

/// Consumes the event queue and dispatches each event to its handlers.
///
/// Every event is dispatched on its own task, so the loop goes back to the
/// queue immediately. Handlers of one event run one after another in
/// registration order; a failing or panicking handler is logged and the
/// remaining handlers still run. Events of different types, or different
/// events of the same type, are dispatched concurrently.
pub struct DomainEventProcessor {
    reader: QueueReader,
    registry: Arc<HandlerRegistry>,
    tasks: TaskTracker,
}

impl DomainEventProcessor {
    pub fn new(reader: QueueReader, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            reader,
            registry,
            tasks: TaskTracker::new(),
        }
    }

    /// Number of dispatch tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Runs the dispatch loop.
    ///
    /// Returns when the queue is closed and drained, or when `cancel` fires.
    /// On cancellation, in-flight dispatch tasks are abandoned at their next
    /// suspension point. Dispatch tasks are not awaited here; use
    /// [`wait_for_in_flight`](Self::wait_for_in_flight) for that.
    #[tracing::instrument(skip_all)]
    pub async fn listen_and_process(&mut self, cancel: CancellationToken) -> ProcessingSummary {
        let mut summary = ProcessingSummary::default();
        tracing::info!("domain event processor started");

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                next = self.reader.dequeue() => next,
            };

            let Some(event) = next else {
                break;
            };
            summary.events_dequeued += 1;
            self.spawn_dispatch(event, cancel.clone());
        }

        tracing::info!(
            events_dequeued = summary.events_dequeued,
            cancelled = summary.cancelled,
            "domain event processor stopped"
        );
        summary
    }

    /// Waits for every dispatch task spawned so far to finish.
    pub async fn wait_for_in_flight(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }

    fn spawn_dispatch(&self, event: Arc<dyn DomainEvent>, cancel: CancellationToken) {
        let event_type = event.event_type();
        let span = tracing::info_span!("dispatch_domain_event", event_type);
        let registry = Arc::clone(&self.registry);

        self.tasks.spawn(
            async move {
                tracing::info!("Processing domain event");
                let work = AssertUnwindSafe(dispatch(&registry, event.as_ref(), &cancel));

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        tracing::warn!("Domain event dispatch abandoned on cancellation");
                    }
                    outcome = work.catch_unwind() => {
                        if let Err(panic) = outcome {
                            metrics::counter!("domain_event_dispatch_faults_total", "event_type" => event_type)
                                .increment(1);
                            tracing::error!(panic = %panic_message(panic.as_ref()), "Failed to process domain event");
                        }
                    }
                }
            }
            .instrument(span),
        );
    }
}

async fn dispatch(registry: &HandlerRegistry, event: &dyn DomainEvent, cancel: &CancellationToken) {
    let event_type = event.event_type();

    let scope = match registry.create_scope(event) {
        Ok(scope) => scope,
        Err(e) => {
            metrics::counter!("domain_event_dispatch_faults_total", "event_type" => event_type)
                .increment(1);
            tracing::error!(error = %e, "Failed to process domain event");
            return;
        }
    };

    if scope.is_empty() {
        tracing::warn!("No handlers found for domain event");
        return;
    }

    tracing::info!(handler_count = scope.len(), "Found handlers for domain event");

    for handler in scope.handlers() {
        let handler_name = handler.name();
        let result = AssertUnwindSafe(handler.handle(event, cancel))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(())) => {
                tracing::debug!(handler = handler_name, "Handler completed");
            }
            Ok(Err(e)) => {
                metrics::counter!("domain_event_handler_failures_total", "event_type" => event_type)
                    .increment(1);
                tracing::error!(handler = handler_name, error = %e, "Domain event handler failed");
            }
            Err(panic) => {
                metrics::counter!("domain_event_handler_failures_total", "event_type" => event_type)
                    .increment(1);
                tracing::error!(
                    handler = handler_name,
                    panic = %panic_message(panic.as_ref()),
                    "Domain event handler panicked"
                );
            }
        }
    }

    metrics::counter!("domain_events_dispatched_total", "event_type" => event_type).increment(1);
    tracing::info!("Successfully processed domain event");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::DomainEventHandler;
    use crate::queue::BoundedEventQueue;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Tick;

    impl DomainEvent for Tick {
        fn event_type(&self) -> &'static str {
            "Tick"
        }
    }

    struct Counter {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DomainEventHandler<Tick> for Counter {
        async fn handle(&self, _event: &Tick, _cancel: &CancellationToken) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");

        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_loop_returns_after_close_and_drain() {
        let queue = BoundedEventQueue::new(4).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();
        registry.register::<Tick, _>(Counter {
            calls: Arc::clone(&calls),
        });
        let mut processor = DomainEventProcessor::new(queue.reader().unwrap(), Arc::new(registry));

        for _ in 0..3 {
            queue.enqueue(Arc::new(Tick)).await.unwrap();
        }
        queue.close();

        let summary = processor.listen_and_process(CancellationToken::new()).await;
        processor.wait_for_in_flight().await;

        assert_eq!(
            summary,
            ProcessingSummary {
                events_dequeued: 3,
                cancelled: false
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(processor.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_loop_returns_on_cancellation() {
        let queue = BoundedEventQueue::new(4).unwrap();
        let mut processor =
            DomainEventProcessor::new(queue.reader().unwrap(), Arc::new(HandlerRegistry::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = processor.listen_and_process(cancel).await;

        assert!(summary.cancelled);
        assert_eq!(summary.events_dequeued, 0);
        assert!(!queue.is_closed());
    }
}
