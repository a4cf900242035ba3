//! Append-only event store boundary.
//!
//! An infrastructure-facing abstraction for storing and loading trip-scoped
//! event streams without making any storage assumptions.

pub mod in_memory;
pub mod store;

pub use in_memory::InMemoryEventStore;
pub use store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Adapter that publishes committed events to an `EventBus` after a
/// successful append.
///
/// Ordering invariant: **publish happens only after append succeeds**, so a
/// failed publication can always be retried from the store.
pub struct PublishingEventStore<S, B> {
    store: S,
    bus: B,
}

impl<S, B> PublishingEventStore<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> EventStore for PublishingEventStore<S, B>
where
    S: EventStore,
    B: tripsplit_events::EventBus<tripsplit_events::EventEnvelope<serde_json::Value>>,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: tripsplit_core::ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        // 1) Append (durable step)
        let committed = self.store.append(events, expected_version)?;

        // 2) Publish committed events (best-effort; at-least-once acceptable)
        for e in &committed {
            self.bus
                .publish(e.to_envelope())
                .map_err(|err| EventStoreError::Publish(format!("{err:?}")))?;
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        trip_id: tripsplit_core::TripId,
        aggregate_id: tripsplit_core::AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.store.load_stream(trip_id, aggregate_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use tripsplit_core::{AggregateId, ExpectedVersion, TripId};
    use tripsplit_events::{EventBus, EventEnvelope, InMemoryEventBus};

    use super::*;

    fn uncommitted(trip_id: TripId, aggregate_id: AggregateId) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            trip_id,
            aggregate_id,
            aggregate_type: "trips.trip".to_string(),
            event_type: "trips.trip.created".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn committed_events_are_published_with_sequence_numbers() {
        let bus: InMemoryEventBus<EventEnvelope<serde_json::Value>> = InMemoryEventBus::new();
        let sub = bus.subscribe();
        let publishing = PublishingEventStore::new(InMemoryEventStore::new(), bus);

        let trip_id = TripId::new();
        let aggregate_id = AggregateId::new();

        publishing
            .append(
                vec![
                    uncommitted(trip_id, aggregate_id),
                    uncommitted(trip_id, aggregate_id),
                ],
                ExpectedVersion::Any,
            )
            .unwrap();

        let first = sub.try_recv().unwrap();
        let second = sub.try_recv().unwrap();
        assert_eq!(first.sequence_number(), 1);
        assert_eq!(second.sequence_number(), 2);
        assert_eq!(first.trip_id(), trip_id);
    }

    #[test]
    fn failed_append_publishes_nothing() {
        let bus: InMemoryEventBus<EventEnvelope<serde_json::Value>> = InMemoryEventBus::new();
        let sub = bus.subscribe();
        let publishing = PublishingEventStore::new(InMemoryEventStore::new(), bus);

        let trip_id = TripId::new();
        let aggregate_id = AggregateId::new();

        let err = publishing
            .append(
                vec![uncommitted(trip_id, aggregate_id)],
                ExpectedVersion::Exact(3),
            )
            .unwrap_err();

        match err {
            EventStoreError::Concurrency(_) => {}
            other => panic!("expected Concurrency, got {other:?}"),
        }
        assert!(sub.try_recv().is_err());
    }
}
