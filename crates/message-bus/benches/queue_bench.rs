use async_trait::async_trait;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::DomainEvent;
use message_bus::{
    BoundedEventQueue, DomainEventHandler, DomainEventProcessor, EventBus, HandlerError,
    HandlerRegistry,
};
use tokio_util::sync::CancellationToken;

use std::sync::Arc;

#[derive(Debug)]
struct BenchEvent(u64);

impl DomainEvent for BenchEvent {
    fn event_type(&self) -> &'static str {
        "BenchEvent"
    }
}

struct NoopHandler;

#[async_trait]
impl DomainEventHandler<BenchEvent> for NoopHandler {
    async fn handle(&self, _event: &BenchEvent, _cancel: &CancellationToken) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Publishes `n` events through a queue of the given capacity and dispatches them all.
async fn publish_and_drain(n: u64, capacity: usize) {
    let queue = BoundedEventQueue::new(capacity).unwrap();
    let mut registry = HandlerRegistry::new();
    registry.register::<BenchEvent, _>(NoopHandler);
    let mut processor = DomainEventProcessor::new(queue.reader().unwrap(), Arc::new(registry));
    let bus = EventBus::new(queue.clone());

    let consumer = tokio::spawn(async move {
        processor.listen_and_process(CancellationToken::new()).await;
        processor.wait_for_in_flight().await;
    });

    let cancel = CancellationToken::new();
    for i in 0..n {
        bus.publish_event(BenchEvent(i), &cancel).await.unwrap();
    }
    queue.close();
    consumer.await.unwrap();
}

fn bench_enqueue_dequeue(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("message_bus/enqueue_dequeue_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                let queue = BoundedEventQueue::new(1000).unwrap();
                let mut reader = queue.reader().unwrap();
                for i in 0..1000 {
                    queue.enqueue(Arc::new(BenchEvent(i))).await.unwrap();
                }
                queue.close();
                while reader.dequeue().await.is_some() {}
            });
        });
    });
}

fn bench_dispatch_capacity_100(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("message_bus/dispatch_1000_capacity_100", |b| {
        b.iter(|| rt.block_on(publish_and_drain(1000, 100)));
    });
}

fn bench_dispatch_capacity_1(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("message_bus/dispatch_1000_capacity_1", |b| {
        b.iter(|| rt.block_on(publish_and_drain(1000, 1)));
    });
}

criterion_group!(
    benches,
    bench_enqueue_dequeue,
    bench_dispatch_capacity_100,
    bench_dispatch_capacity_1
);
criterion_main!(benches);
