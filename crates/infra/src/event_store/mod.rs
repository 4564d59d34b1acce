//! Append-only event store boundary.
//!
//! Streams are keyed by `(aggregate_type, aggregate_id)`. A commit may span
//! several streams and is applied atomically.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{
    validate_batch, EventStore, EventStoreError, StoredEvent, StreamAppend, StreamKey,
    UncommittedEvent,
};

use salesflow_events::{EventBus, EventEnvelope};

/// Adapter that publishes committed events to an `EventBus` after a successful commit.
///
/// Publish happens only after the commit succeeds. A failed publish is logged
/// and does not undo or fail the commit: the events are durable and any
/// projection can be rebuilt from the store.
pub struct PublishingEventStore<S, B> {
    store: S,
    bus: B,
}

impl<S, B> PublishingEventStore<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> EventStore for PublishingEventStore<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<serde_json::Value>>,
{
    fn commit(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        let committed = self.store.commit(batch)?;

        for e in &committed {
            if let Err(err) = self.bus.publish(e.to_envelope()) {
                tracing::warn!(
                    event_id = %e.event_id,
                    stream = %e.stream_key(),
                    error = ?err,
                    "event publication failed after commit"
                );
            }
        }

        Ok(committed)
    }

    fn load_stream(&self, stream: &StreamKey) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.store.load_stream(stream)
    }

    fn load_by_type(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.store.load_by_type(aggregate_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use salesflow_core::{AggregateId, ExpectedVersion};
    use salesflow_events::InMemoryEventBus;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn committed_events_are_published_in_order() {
        let bus: InMemoryEventBus<EventEnvelope<serde_json::Value>> = InMemoryEventBus::new();
        let sub = bus.subscribe();
        let store = PublishingEventStore::new(InMemoryEventStore::new(), bus);
        let id = AggregateId::new("SO-0001").unwrap();

        let events = (0..2)
            .map(|n| UncommittedEvent {
                event_id: Uuid::now_v7(),
                aggregate_id: id.clone(),
                aggregate_type: "sales.order".to_string(),
                event_type: "test.happened".to_string(),
                event_version: 1,
                occurred_at: Utc::now(),
                payload: serde_json::json!({ "n": n }),
            })
            .collect();
        store.append(events, ExpectedVersion::Exact(0)).unwrap();

        let first = sub.recv_timeout(Duration::from_secs(1)).unwrap();
        let second = sub.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(first.sequence_number(), 1);
        assert_eq!(second.sequence_number(), 2);
        assert_eq!(first.aggregate_id(), &id);
    }

    #[test]
    fn rejected_commit_publishes_nothing() {
        let bus: InMemoryEventBus<EventEnvelope<serde_json::Value>> = InMemoryEventBus::new();
        let sub = bus.subscribe();
        let store = PublishingEventStore::new(InMemoryEventStore::new(), bus);

        let event = UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate_id: AggregateId::new("SO-0001").unwrap(),
            aggregate_type: "sales.order".to_string(),
            event_type: "test.happened".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: serde_json::json!({}),
        };
        assert!(store.append(vec![event], ExpectedVersion::Exact(3)).is_err());
        assert!(sub.try_recv().is_err());
    }
}
