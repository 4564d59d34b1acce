use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use salesflow_core::{AggregateId, ExpectedVersion};
use std::sync::Arc;

/// Identity of one event stream: one aggregate instance of one aggregate type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamKey {
    pub aggregate_type: String,
    pub aggregate_id: AggregateId,
}

impl StreamKey {
    pub fn new(aggregate_type: impl Into<String>, aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id,
        }
    }
}

impl core::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.aggregate_type, self.aggregate_id)
    }
}

/// An event ready to be appended to a stream (not yet assigned a sequence number).
///
/// Events go through this lifecycle:
///
/// 1. **Domain event**: decided by an aggregate's `handle()`
/// 2. **UncommittedEvent**: serialized and wrapped with stream metadata
/// 3. **StoredEvent**: persisted with an assigned `sequence_number`
/// 4. **EventEnvelope**: published to the event bus for projections
///
/// Use [`UncommittedEvent::from_typed`] to build one from a typed domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A stored event in an append-only stream (assigned a sequence number).
///
/// Sequence numbers start at 1, increase by one per event, are scoped to the
/// stream and never change once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    pub fn stream_key(&self) -> StreamKey {
        StreamKey::new(self.aggregate_type.clone(), self.aggregate_id.clone())
    }

    /// Convert a stored event into an envelope for publication.
    pub fn to_envelope(&self) -> salesflow_events::EventEnvelope<JsonValue> {
        salesflow_events::EventEnvelope::new(
            self.event_id,
            self.aggregate_id.clone(),
            self.aggregate_type.clone(),
            self.sequence_number,
            self.event_type.clone(),
            self.occurred_at,
            self.payload.clone(),
        )
    }
}

/// Events for one stream inside an atomic commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAppend {
    pub stream: StreamKey,
    pub expected_version: ExpectedVersion,
    pub events: Vec<UncommittedEvent>,
}

impl StreamAppend {
    pub fn new(stream: StreamKey, expected_version: ExpectedVersion) -> Self {
        Self {
            stream,
            expected_version,
            events: Vec::new(),
        }
    }

    /// Check that every event targets this append's stream.
    pub fn validate(&self) -> Result<(), EventStoreError> {
        for (idx, e) in self.events.iter().enumerate() {
            if e.aggregate_type != self.stream.aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream {} received '{}' event at index {idx}",
                    self.stream, e.aggregate_type
                )));
            }
            if e.aggregate_id != self.stream.aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "stream {} received event for aggregate {} at index {idx}",
                    self.stream, e.aggregate_id
                )));
            }
        }
        Ok(())
    }
}

/// Check a commit batch before touching storage: no stream twice, every
/// event on its declared stream.
pub fn validate_batch(batch: &[StreamAppend]) -> Result<(), EventStoreError> {
    let mut seen = std::collections::HashSet::with_capacity(batch.len());
    for append in batch {
        if !seen.insert(&append.stream) {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream {} appears more than once in one commit",
                append.stream
            )));
        }
        append.validate()?;
    }
    Ok(())
}

/// Event store operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// A stream's version moved since it was read. Safe to retry.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    /// Storage could not be reached or failed mid-operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl EventStoreError {
    pub fn is_concurrency(&self) -> bool {
        matches!(self, EventStoreError::Concurrency(_))
    }
}

/// Append-only event store with atomic multi-stream commits.
///
/// ## Event Streams
///
/// Events are organized into **streams**, one per aggregate instance, keyed by
/// `(aggregate_type, aggregate_id)`. Within a stream, events have sequence
/// numbers 1, 2, 3, ...
///
/// ## Commit Semantics
///
/// `commit()`:
/// - Validates that each append's events belong to its stream
/// - Checks every stream's `ExpectedVersion` against its current version
/// - Assigns sequence numbers (starting at current_version + 1)
/// - Persists **all** appends or **none** of them
///
/// A failed version check on any stream rejects the whole batch with
/// [`EventStoreError::Concurrency`].
///
/// ## Load Semantics
///
/// `load_stream()` returns the stream in sequence order, or an empty vector if
/// the aggregate has never been written.
pub trait EventStore: Send + Sync {
    /// Atomically append to several streams.
    fn commit(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream for one aggregate.
    fn load_stream(&self, stream: &StreamKey) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load every event of one aggregate type, ordered by stream then sequence.
    fn load_by_type(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Append to a single stream.
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };
        let stream = StreamKey::new(first.aggregate_type.clone(), first.aggregate_id.clone());
        self.commit(vec![StreamAppend {
            stream,
            expected_version,
            events,
        }])
    }
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn commit(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).commit(batch)
    }

    fn load_stream(&self, stream: &StreamKey) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(stream)
    }

    fn load_by_type(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_by_type(aggregate_type)
    }
}

impl UncommittedEvent {
    /// Build from a typed domain event, capturing the metadata needed to
    /// deserialize it later.
    pub fn from_typed<E>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: salesflow_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| EventStoreError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
