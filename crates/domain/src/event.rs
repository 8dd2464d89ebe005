//! Domain event trait and runtime type helpers.

use std::any::{Any, TypeId};
use std::fmt::Debug;

/// Trait for domain events.
///
/// Domain events represent facts that happened inside a business operation.
/// They are immutable and should be named in past tense. The concrete Rust
/// type of an event is its dispatch key: handlers subscribe to a type, not
/// to a name.
pub trait DomainEvent: Any + Debug + Send + Sync {
    /// Returns the event type name, used in logs and metrics labels.
    fn event_type(&self) -> &'static str;
}

impl dyn DomainEvent {
    /// Returns the dispatch key of the concrete event type.
    pub fn type_key(&self) -> TypeId {
        (self as &dyn Any).type_id()
    }

    /// Returns true if the event is of type `E`.
    pub fn is<E: DomainEvent>(&self) -> bool {
        (self as &dyn Any).is::<E>()
    }

    /// Downcasts to the concrete event type.
    pub fn downcast_ref<E: DomainEvent>(&self) -> Option<&E> {
        (self as &dyn Any).downcast_ref::<E>()
    }
}
