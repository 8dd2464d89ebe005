//! Bounded FIFO queue of domain events.

use std::sync::{Arc, Mutex};

use domain::DomainEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::BusConfig;
use crate::error::QueueError;

type EventSender = mpsc::Sender<Arc<dyn DomainEvent>>;
type EventReceiver = mpsc::Receiver<Arc<dyn DomainEvent>>;

/// Bounded, multi-producer, single-consumer queue of domain events.
///
/// Producers wait for space when the queue is full; no event is ever dropped
/// to make room. Once closed, new enqueues fail, while events already queued
/// stay available to the reader until drained.
///
/// Cloning the queue yields another producer handle on the same queue.
#[derive(Clone)]
pub struct BoundedEventQueue {
    sender: EventSender,
    receiver: Arc<Mutex<Option<EventReceiver>>>,
    closed: CancellationToken,
}

impl BoundedEventQueue {
    /// Creates an empty open queue. Capacity must be at least 1.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::InvalidCapacity);
        }

        let (sender, receiver) = mpsc::channel(capacity);
        Ok(Self {
            sender,
            receiver: Arc::new(Mutex::new(Some(receiver))),
            closed: CancellationToken::new(),
        })
    }

    /// Creates a queue sized from the bus configuration.
    pub fn from_config(config: &BusConfig) -> Result<Self, QueueError> {
        Self::new(config.capacity())
    }

    /// Appends an event, waiting while the queue is full.
    ///
    /// Fails with [`QueueError::Closed`] if the queue is closed before or
    /// while waiting for space. Dropping the returned future abandons the
    /// wait without enqueuing.
    pub async fn enqueue(&self, event: Arc<dyn DomainEvent>) -> Result<(), QueueError> {
        if self.closed.is_cancelled() {
            return Err(QueueError::Closed);
        }

        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(QueueError::Closed),
            sent = self.sender.send(event) => {
                sent.map_err(|_| QueueError::Closed)?;
                self.record_depth();
                Ok(())
            }
        }
    }

    /// Appends an event without waiting.
    pub fn try_enqueue(&self, event: Arc<dyn DomainEvent>) -> Result<(), QueueError> {
        if self.closed.is_cancelled() {
            return Err(QueueError::Closed);
        }

        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })?;
        self.record_depth();
        Ok(())
    }

    /// Closes the queue. Idempotent; returns true for the call that closed it.
    ///
    /// Producers waiting for space are released with [`QueueError::Closed`].
    pub fn close(&self) -> bool {
        if self.closed.is_cancelled() {
            return false;
        }
        self.closed.cancel();
        tracing::info!(pending = self.len(), "domain event queue closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Number of events queued and not yet dequeued.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Takes the single reader of this queue.
    pub fn reader(&self) -> Result<QueueReader, QueueError> {
        let mut slot = self
            .receiver
            .lock()
            .map_err(|_| QueueError::ReaderTaken)?;
        let receiver = slot.take().ok_or(QueueError::ReaderTaken)?;

        Ok(QueueReader {
            receiver,
            closed: self.closed.clone(),
            draining: false,
        })
    }

    fn record_depth(&self) {
        metrics::gauge!("domain_event_queue_depth").set(self.len() as f64);
    }
}

impl std::fmt::Debug for BoundedEventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedEventQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The consuming end of a [`BoundedEventQueue`].
#[derive(Debug)]
pub struct QueueReader {
    receiver: EventReceiver,
    closed: CancellationToken,
    draining: bool,
}

impl QueueReader {
    /// Removes the oldest event, waiting while the queue is open and empty.
    ///
    /// Returns `None` once the queue is closed and drained. Dropping the
    /// returned future loses no event.
    pub async fn dequeue(&mut self) -> Option<Arc<dyn DomainEvent>> {
        if !self.draining {
            tokio::select! {
                biased;
                event = self.receiver.recv() => {
                    self.record_depth();
                    return event;
                }
                () = self.closed.cancelled() => {
                    self.receiver.close();
                    self.draining = true;
                }
            }
        }

        let event = self.receiver.recv().await;
        self.record_depth();
        event
    }

    /// Number of events waiting to be dequeued.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    fn record_depth(&self) {
        metrics::gauge!("domain_event_queue_depth").set(self.receiver.len() as f64);
    }
}
