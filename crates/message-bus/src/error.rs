//! Message bus error types.

use thiserror::Error;

/// Errors raised by the bounded event queue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue was created with a capacity of zero.
    #[error("Queue capacity must be at least 1")]
    InvalidCapacity,

    /// The queue was closed; no further events are accepted.
    #[error("Queue is closed")]
    Closed,

    /// The queue is at capacity (non-waiting enqueue only).
    #[error("Queue is full")]
    Full,

    /// The single reader was already handed out.
    #[error("Queue reader was already taken")]
    ReaderTaken,
}

/// Errors returned to producers publishing an event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Publishing after shutdown began.
    #[error("Cannot publish domain event: the event queue is closed")]
    QueueClosed,

    /// The producer was cancelled while waiting for queue space.
    #[error("Publishing was cancelled while waiting for queue space")]
    Cancelled,

    /// Any other queue error.
    #[error("Queue error: {0}")]
    Queue(QueueError),
}

impl From<QueueError> for PublishError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Closed => PublishError::QueueClosed,
            other => PublishError::Queue(other),
        }
    }
}

/// Errors returned by domain event handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler could not complete its work.
    #[error("Handler failed: {0}")]
    Failed(String),

    /// The handler was invoked with an event of another type.
    #[error("Handler for {expected} received {actual}")]
    EventTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// A per-event handler instance could not be built.
    #[error("Handler construction failed: {0}")]
    Construction(String),

    /// The handler stopped because processing was cancelled.
    #[error("Handler was cancelled")]
    Cancelled,

    /// Error raised by a collaborator of the handler.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

/// Faults of the dispatch machinery itself, as opposed to handler faults.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Building the per-event handler scope failed.
    #[error("Failed to create handler scope for {event_type} (handler {handler}): {source}")]
    ScopeCreation {
        event_type: &'static str,
        handler: &'static str,
        #[source]
        source: HandlerError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_queue_maps_to_queue_closed() {
        assert_eq!(
            PublishError::from(QueueError::Closed),
            PublishError::QueueClosed
        );
        assert_eq!(
            PublishError::from(QueueError::Full),
            PublishError::Queue(QueueError::Full)
        );
    }

    #[test]
    fn boxed_errors_convert_into_handler_errors() {
        let source: Box<dyn std::error::Error + Send + Sync> = "smtp unavailable".into();
        let error = HandlerError::from(source);
        assert_eq!(error.to_string(), "smtp unavailable");
    }
}
