//! Message bus configuration.

use crate::error::QueueError;

/// Default maximum number of queued, not yet dispatched events.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Configuration of the domain event bus.
///
/// The queue capacity is the only tunable: producers wait once this many
/// events are queued and not yet picked up by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    capacity: usize,
}

impl BusConfig {
    /// Creates a configuration, rejecting a zero capacity.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::InvalidCapacity);
        }
        Ok(Self { capacity })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}
