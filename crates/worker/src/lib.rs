//! Process host for the plate game core.
//!
//! Wires one bounded event queue to every producer (through [`EventBus`])
//! and to the single [`DomainEventProcessor`], registers the game event
//! handlers, and owns the shutdown sequence: close the queue, let the
//! processor drain it, then wait for in-flight dispatches.

pub mod config;
pub mod console;
pub mod error;
pub mod games;
pub mod scoreboard;

use std::sync::Arc;

use domain::{GameEnded, GameStarted, LicensePlateSpotsRemoved, LicensePlatesSpotted};
use message_bus::{
    BoundedEventQueue, BusConfig, DomainEventLogger, DomainEventProcessor, EventBus,
    HandlerRegistry, ProcessingSummary,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use config::{Config, LogFormat};
pub use error::{ConfigError, WorkerError};
pub use games::{GameCommands, GameStore};
pub use scoreboard::{GameTally, Scoreboard, ScoreboardUpdater};

/// Builds the handler registry for the game events.
///
/// Every game event is logged; the scoreboard gets a fresh updater per event.
pub fn create_registry(scoreboard: &Scoreboard) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    registry
        .register::<GameStarted, _>(DomainEventLogger)
        .register::<LicensePlatesSpotted, _>(DomainEventLogger)
        .register::<LicensePlateSpotsRemoved, _>(DomainEventLogger)
        .register::<GameEnded, _>(DomainEventLogger);

    register_scoreboard::<GameStarted>(&mut registry, scoreboard);
    register_scoreboard::<LicensePlatesSpotted>(&mut registry, scoreboard);
    register_scoreboard::<LicensePlateSpotsRemoved>(&mut registry, scoreboard);
    register_scoreboard::<GameEnded>(&mut registry, scoreboard);

    registry
}

fn register_scoreboard<E>(registry: &mut HandlerRegistry, scoreboard: &Scoreboard)
where
    E: domain::DomainEvent,
    ScoreboardUpdater: message_bus::DomainEventHandler<E>,
{
    let scoreboard = scoreboard.clone();
    registry.register_scoped::<E, _, _>(move || Ok(ScoreboardUpdater::new(scoreboard.clone())));
}

/// The event pipeline before its consumer loop is started.
pub struct Pipeline {
    queue: BoundedEventQueue,
    processor: DomainEventProcessor,
}

impl Pipeline {
    /// Creates the queue and the processor reading from it.
    pub fn new(config: &BusConfig, registry: HandlerRegistry) -> Result<Self, WorkerError> {
        let queue = BoundedEventQueue::from_config(config)?;
        let processor = DomainEventProcessor::new(queue.reader()?, Arc::new(registry));
        Ok(Self { queue, processor })
    }

    /// Returns a publisher feeding this pipeline.
    pub fn bus(&self) -> EventBus {
        EventBus::new(self.queue.clone())
    }

    /// Spawns the consumer loop.
    pub fn start(self, cancel: CancellationToken) -> RunningPipeline {
        let Self {
            queue,
            mut processor,
        } = self;

        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let summary = processor.listen_and_process(loop_cancel).await;
            processor.wait_for_in_flight().await;
            summary
        });

        RunningPipeline {
            queue,
            cancel,
            handle,
        }
    }
}

/// A started event pipeline.
pub struct RunningPipeline {
    queue: BoundedEventQueue,
    cancel: CancellationToken,
    handle: JoinHandle<ProcessingSummary>,
}

impl RunningPipeline {
    pub fn queue(&self) -> &BoundedEventQueue {
        &self.queue
    }

    /// Graceful stop: rejects new events, dispatches the queued ones and
    /// waits for every dispatch to finish.
    #[tracing::instrument(skip_all)]
    pub async fn shutdown(self) -> Result<ProcessingSummary, WorkerError> {
        self.queue.close();
        let summary = self.handle.await?;
        tracing::info!(
            events_dequeued = summary.events_dequeued,
            "event pipeline drained"
        );
        Ok(summary)
    }

    /// Hard stop: cancels the loop and abandons in-flight dispatches.
    #[tracing::instrument(skip_all)]
    pub async fn abort(self) -> Result<ProcessingSummary, WorkerError> {
        self.queue.close();
        self.cancel.cancel();
        let summary = self.handle.await?;
        tracing::warn!(
            events_dequeued = summary.events_dequeued,
            pending = self.queue.len(),
            "event pipeline aborted"
        );
        Ok(summary)
    }
}
