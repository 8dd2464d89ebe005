//! In-process domain event pipeline.
//!
//! This crate moves domain events from the code that raised them to the
//! handlers that react to them:
//! - [`BoundedEventQueue`]: fixed-capacity FIFO, producers wait when it is full
//! - [`EventBus`]: the publish API used by producers
//! - [`HandlerRegistry`]: handlers keyed by event type, instantiated per event
//! - [`DomainEventProcessor`]: the single consumer loop that fans events out
//!
//! Dispatch is fire-and-forget. Events leave the queue in the order they
//! entered it, but the handler sets of two events run concurrently and may
//! finish in any order.

pub mod bus;
pub mod config;
pub mod error;
pub mod handler;
pub mod processor;
pub mod queue;
pub mod registry;

pub use bus::{EventBus, EventPublisher};
pub use config::{BusConfig, DEFAULT_QUEUE_CAPACITY};
pub use error::{DispatchError, HandlerError, PublishError, QueueError};
pub use handler::{DomainEventHandler, DomainEventLogger};
pub use processor::{DomainEventProcessor, ProcessingSummary};
pub use queue::{BoundedEventQueue, QueueReader};
pub use registry::{HandlerRegistry, HandlerScope};
