//! Aggregate root trait and pending event accumulation.

use std::sync::Arc;

use common::AggregateId;

use crate::event::DomainEvent;

/// Domain events raised by an aggregate and not yet published.
///
/// Uniqueness is by value: recording an event equal to one already pending
/// is a no-op. Publishing order is not significant.
#[derive(Debug, Default, Clone)]
pub struct PendingEvents {
    events: Vec<Arc<dyn DomainEvent>>,
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event. Returns false if an equal event was already pending.
    pub fn record<E>(&mut self, event: E) -> bool
    where
        E: DomainEvent + PartialEq,
    {
        let duplicate = self
            .events
            .iter()
            .any(|pending| pending.downcast_ref::<E>() == Some(&event));
        if duplicate {
            return false;
        }

        self.events.push(Arc::new(event));
        true
    }

    pub fn as_slice(&self) -> &[Arc<dyn DomainEvent>] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Trait for aggregate roots.
///
/// An aggregate root owns a consistency boundary. Mutations on it record
/// domain events, which stay pending on the root; collecting and publishing
/// them is the job of the persistence boundary (the unit of work), which
/// also tracks which events it already handed off. Roots never clear their
/// own pending events.
pub trait AggregateRoot: Send + Sync {
    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str
    where
        Self: Sized;

    /// Returns the aggregate's unique identifier.
    fn id(&self) -> AggregateId;

    /// Returns the events raised so far and not yet published.
    fn domain_events(&self) -> &[Arc<dyn DomainEvent>];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Renamed {
        name: String,
    }

    impl DomainEvent for Renamed {
        fn event_type(&self) -> &'static str {
            "Renamed"
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Closed;

    impl DomainEvent for Closed {
        fn event_type(&self) -> &'static str {
            "Closed"
        }
    }

    struct TestRoot {
        id: AggregateId,
        events: PendingEvents,
    }

    impl TestRoot {
        fn rename(&mut self, name: &str) {
            self.events.record(Renamed {
                name: name.to_string(),
            });
        }
    }

    impl AggregateRoot for TestRoot {
        fn aggregate_type() -> &'static str {
            "TestRoot"
        }

        fn id(&self) -> AggregateId {
            self.id
        }

        fn domain_events(&self) -> &[Arc<dyn DomainEvent>] {
            self.events.as_slice()
        }
    }

    #[test]
    fn equal_events_are_recorded_once() {
        let mut events = PendingEvents::new();

        assert!(events.record(Closed));
        assert!(!events.record(Closed));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn distinct_values_of_one_type_are_kept() {
        let mut events = PendingEvents::new();

        events.record(Renamed {
            name: "a".to_string(),
        });
        events.record(Renamed {
            name: "b".to_string(),
        });
        events.record(Closed);

        assert_eq!(events.len(), 3);
    }

    #[test]
    fn reading_pending_events_does_not_clear_them() {
        let mut root = TestRoot {
            id: AggregateId::new(),
            events: PendingEvents::new(),
        };
        root.rename("first");

        assert_eq!(root.domain_events().len(), 1);
        assert_eq!(root.domain_events().len(), 1);
        assert_eq!(TestRoot::aggregate_type(), "TestRoot");
        assert_eq!(root.domain_events()[0].event_type(), "Renamed");
    }
}
