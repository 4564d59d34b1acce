use std::collections::HashMap;
use std::sync::RwLock;

use super::r#trait::{validate_batch, EventStore, EventStoreError, StoredEvent, StreamAppend, StreamKey};

/// In-memory append-only event store.
///
/// Intended for tests/dev. A single lock covers every stream, so a commit
/// either lands on all of its streams or on none.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: Option<&Vec<StoredEvent>>) -> u64 {
        stream
            .and_then(|s| s.last())
            .map(|e| e.sequence_number)
            .unwrap_or(0)
    }

    /// Total number of stored events across all streams.
    pub fn event_count(&self) -> usize {
        self.streams
            .read()
            .map(|s| s.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn commit(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        validate_batch(&batch)?;

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        // Check every stream before writing any of them.
        for append in &batch {
            let current = Self::current_version(streams.get(&append.stream));
            if !append.expected_version.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {}: expected {:?}, found {current}",
                    append.stream, append.expected_version
                )));
            }
        }

        let mut committed = Vec::new();
        for append in batch {
            if append.events.is_empty() {
                continue;
            }
            let stream = streams.entry(append.stream).or_default();
            let mut next = stream.last().map(|e| e.sequence_number).unwrap_or(0) + 1;
            for e in append.events {
                let stored = StoredEvent {
                    event_id: e.event_id,
                    aggregate_id: e.aggregate_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: next,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                };
                next += 1;
                stream.push(stored.clone());
                committed.push(stored);
            }
        }

        Ok(committed)
    }

    fn load_stream(&self, stream: &StreamKey) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(streams.get(stream).cloned().unwrap_or_default())
    }

    fn load_by_type(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        let mut keys: Vec<&StreamKey> = streams
            .keys()
            .filter(|k| k.aggregate_type == aggregate_type)
            .collect();
        keys.sort();

        Ok(keys
            .into_iter()
            .flat_map(|k| streams[k].iter().cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::UncommittedEvent;
    use chrono::Utc;
    use salesflow_core::{AggregateId, ExpectedVersion};
    use uuid::Uuid;

    fn key(kind: &str, id: &str) -> StreamKey {
        StreamKey::new(kind, AggregateId::new(id).unwrap())
    }

    fn event(stream: &StreamKey, n: u32) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate_id: stream.aggregate_id.clone(),
            aggregate_type: stream.aggregate_type.clone(),
            event_type: "test.happened".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: serde_json::json!({ "n": n }),
        }
    }

    fn append(stream: &StreamKey, expected: ExpectedVersion, count: u32) -> StreamAppend {
        StreamAppend {
            stream: stream.clone(),
            expected_version: expected,
            events: (0..count).map(|n| event(stream, n)).collect(),
        }
    }

    #[test]
    fn commit_assigns_sequence_numbers_per_stream() {
        let store = InMemoryEventStore::new();
        let order = key("sales.order", "SO-0001");
        let stock = key("inventory.record", "WIDGET-01");

        let committed = store
            .commit(vec![
                append(&order, ExpectedVersion::Exact(0), 2),
                append(&stock, ExpectedVersion::Exact(0), 1),
            ])
            .unwrap();

        assert_eq!(committed.len(), 3);
        let seqs: Vec<u64> = store.load_stream(&order).unwrap().iter().map(|e| e.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(store.load_stream(&stock).unwrap()[0].sequence_number, 1);
    }

    #[test]
    fn stale_stream_rejects_whole_batch() {
        let store = InMemoryEventStore::new();
        let order = key("sales.order", "SO-0001");
        let stock = key("inventory.record", "WIDGET-01");
        store.commit(vec![append(&stock, ExpectedVersion::Exact(0), 1)]).unwrap();

        let err = store
            .commit(vec![
                append(&order, ExpectedVersion::Exact(0), 1),
                append(&stock, ExpectedVersion::Exact(0), 1),
            ])
            .unwrap_err();

        assert!(err.is_concurrency());
        assert!(store.load_stream(&order).unwrap().is_empty());
        assert_eq!(store.load_stream(&stock).unwrap().len(), 1);
    }

    #[test]
    fn same_stream_twice_in_one_batch_is_rejected() {
        let store = InMemoryEventStore::new();
        let order = key("sales.order", "SO-0001");

        match store.commit(vec![
            append(&order, ExpectedVersion::Any, 1),
            append(&order, ExpectedVersion::Any, 1),
        ]) {
            Err(EventStoreError::InvalidAppend(msg)) if msg.contains("more than once") => {}
            other => panic!("Expected InvalidAppend, got {other:?}"),
        }
    }

    #[test]
    fn events_must_match_their_stream() {
        let store = InMemoryEventStore::new();
        let order = key("sales.order", "SO-0001");
        let mut bad = append(&order, ExpectedVersion::Any, 1);
        bad.events[0].aggregate_type = "inventory.record".to_string();

        assert!(matches!(
            store.commit(vec![bad]),
            Err(EventStoreError::AggregateTypeMismatch(_))
        ));
    }

    #[test]
    fn same_id_under_different_types_are_separate_streams() {
        let store = InMemoryEventStore::new();
        let a = key("sales.order", "X-1");
        let b = key("documents.invoice", "X-1");
        store.commit(vec![append(&a, ExpectedVersion::Exact(0), 1)]).unwrap();
        store.commit(vec![append(&b, ExpectedVersion::Exact(0), 1)]).unwrap();

        assert_eq!(store.load_by_type("sales.order").unwrap().len(), 1);
        assert_eq!(store.load_by_type("documents.invoice").unwrap().len(), 1);
        assert_eq!(store.event_count(), 2);
    }
}
