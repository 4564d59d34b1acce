//! Postgres-backed event store implementation.
//!
//! A commit runs in one transaction: every stream's version is checked, then
//! all events are inserted. The unique key on
//! `(aggregate_type, aggregate_id, sequence_number)` catches writers that
//! raced past the version check.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | EventStoreError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) | `23505` | `Concurrency` |
//! | Database (check constraint violation) | `23514` | `InvalidAppend` |
//! | Database (other) | Any other | `InvalidAppend` |
//! | Io / Tls / PoolTimedOut / PoolClosed | N/A | `Unavailable` |
//! | Other | N/A | `InvalidAppend` |
//!
//! ## Runtime
//!
//! The `EventStore` trait is synchronous. The trait impl drives the async
//! methods on the current tokio handle inside `block_in_place`, so it must be
//! called from a multi-threaded runtime (or from `spawn_blocking`).

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::future::Future;
use std::sync::Arc;
use tracing::{instrument, Span};

use salesflow_core::AggregateId;

use super::r#trait::{validate_batch, EventStore, EventStoreError, StoredEvent, StreamAppend, StreamKey};

/// Schema for the event log and the id sequences. Each statement is idempotent.
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS events (
        event_id UUID PRIMARY KEY,
        aggregate_type TEXT NOT NULL,
        aggregate_id TEXT NOT NULL,
        sequence_number BIGINT NOT NULL CHECK (sequence_number > 0),
        event_type TEXT NOT NULL,
        event_version INTEGER NOT NULL,
        occurred_at TIMESTAMPTZ NOT NULL,
        payload JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (aggregate_type, aggregate_id, sequence_number)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS events_by_type
        ON events (aggregate_type, aggregate_id, sequence_number)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS id_sequences (
        prefix TEXT PRIMARY KEY,
        last_value BIGINT NOT NULL
    )
    "#,
];

/// Postgres-backed append-only event store.
///
/// Uses the SQLx connection pool, so it is `Send + Sync` and cheap to clone.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: Arc<PgPool>,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the tables this store (and the id generator) rely on.
    pub async fn ensure_schema(&self) -> Result<(), EventStoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    /// Load all events of one stream in sequence order.
    #[instrument(skip(self), fields(stream = %stream, event_count = tracing::field::Empty), err)]
    pub async fn load_stream_async(&self, stream: &StreamKey) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                event_id,
                aggregate_type,
                aggregate_id,
                sequence_number,
                event_type,
                event_version,
                occurred_at,
                payload
            FROM events
            WHERE aggregate_type = $1 AND aggregate_id = $2
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(&stream.aggregate_type)
        .bind(stream.aggregate_id.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stream", e))?;

        let events = rows_to_events(rows)?;
        Span::current().record("event_count", events.len());
        Ok(events)
    }

    /// Load every stream of one aggregate type.
    #[instrument(skip(self), err)]
    pub async fn load_by_type_async(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                event_id,
                aggregate_type,
                aggregate_id,
                sequence_number,
                event_type,
                event_version,
                occurred_at,
                payload
            FROM events
            WHERE aggregate_type = $1
            ORDER BY aggregate_id ASC, sequence_number ASC
            "#,
        )
        .bind(aggregate_type)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_by_type", e))?;

        rows_to_events(rows)
    }

    /// Atomically append to several streams.
    ///
    /// 1. Starts a transaction
    /// 2. Checks each stream's current version against its expectation
    /// 3. Inserts every event with its next sequence number
    /// 4. Commits (or rolls back on the first failure)
    #[instrument(skip(self, batch), fields(streams = batch.len(), committed_events = tracing::field::Empty), err)]
    pub async fn commit_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        validate_batch(&batch)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut committed = Vec::new();
        for append in batch {
            let current = check_stream_version(&mut tx, &append.stream).await?;
            if !append.expected_version.matches(current) {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(EventStoreError::Concurrency(format!(
                    "stream {}: expected {:?}, found {current}",
                    append.stream, append.expected_version
                )));
            }

            let mut next_sequence = current + 1;
            for event in append.events {
                sqlx::query(
                    r#"
                    INSERT INTO events (
                        event_id,
                        aggregate_type,
                        aggregate_id,
                        sequence_number,
                        event_type,
                        event_version,
                        occurred_at,
                        payload
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(event.event_id)
                .bind(&event.aggregate_type)
                .bind(event.aggregate_id.as_str())
                .bind(next_sequence as i64)
                .bind(&event.event_type)
                .bind(event.event_version as i32)
                .bind(event.occurred_at)
                .bind(&event.payload)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        EventStoreError::Concurrency(format!(
                            "concurrent append detected on {}: sequence_number {next_sequence} already exists",
                            append.stream
                        ))
                    } else {
                        map_sqlx_error("insert_event", e)
                    }
                })?;

                committed.push(StoredEvent {
                    event_id: event.event_id,
                    aggregate_id: event.aggregate_id,
                    aggregate_type: event.aggregate_type,
                    sequence_number: next_sequence,
                    event_type: event.event_type,
                    event_version: event.event_version,
                    occurred_at: event.occurred_at,
                    payload: event.payload,
                });
                next_sequence += 1;
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("committed_events", committed.len());
        Ok(committed)
    }
}

/// Current version of a stream (0 if it doesn't exist).
async fn check_stream_version(
    tx: &mut Transaction<'_, Postgres>,
    stream: &StreamKey,
) -> Result<u64, EventStoreError> {
    let row = sqlx::query(
        r#"
        SELECT COALESCE(MAX(sequence_number), 0) AS current_version
        FROM events
        WHERE aggregate_type = $1 AND aggregate_id = $2
        "#,
    )
    .bind(&stream.aggregate_type)
    .bind(stream.aggregate_id.as_str())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("check_stream_version", e))?;

    let current_version: i64 = row
        .try_get("current_version")
        .map_err(|e| EventStoreError::InvalidAppend(format!("failed to read current_version: {e}")))?;

    Ok(current_version as u64)
}

/// Run a store future to completion from synchronous code.
pub(crate) fn run_blocking<F, T>(future: F) -> Result<T, EventStoreError>
where
    F: Future<Output = Result<T, EventStoreError>>,
{
    let handle = tokio::runtime::Handle::try_current().map_err(|_| {
        EventStoreError::Unavailable("postgres storage requires a tokio runtime".to_string())
    })?;
    tokio::task::block_in_place(|| handle.block_on(future))
}

/// Map SQLx errors to EventStoreError.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => EventStoreError::Concurrency(msg),
                _ => EventStoreError::InvalidAppend(msg),
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => {
            EventStoreError::Unavailable(format!("{operation}: {err}"))
        }
        _ => EventStoreError::InvalidAppend(format!("sqlx error in {operation}: {err}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}

// SQLx row types

#[derive(Debug)]
struct StoredEventRow {
    event_id: uuid::Uuid,
    aggregate_type: String,
    aggregate_id: String,
    sequence_number: i64,
    event_type: String,
    event_version: i32,
    occurred_at: DateTime<Utc>,
    payload: serde_json::Value,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredEventRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredEventRow {
            event_id: row.try_get("event_id")?,
            aggregate_type: row.try_get("aggregate_type")?,
            aggregate_id: row.try_get("aggregate_id")?,
            sequence_number: row.try_get("sequence_number")?,
            event_type: row.try_get("event_type")?,
            event_version: row.try_get("event_version")?,
            occurred_at: row.try_get("occurred_at")?,
            payload: row.try_get("payload")?,
        })
    }
}

impl TryFrom<StoredEventRow> for StoredEvent {
    type Error = EventStoreError;

    fn try_from(row: StoredEventRow) -> Result<Self, Self::Error> {
        let aggregate_id = AggregateId::new(row.aggregate_id)
            .map_err(|e| EventStoreError::InvalidAppend(format!("stored aggregate_id: {e}")))?;
        Ok(StoredEvent {
            event_id: row.event_id,
            aggregate_id,
            aggregate_type: row.aggregate_type,
            sequence_number: row.sequence_number as u64,
            event_type: row.event_type,
            event_version: row.event_version as u32,
            occurred_at: row.occurred_at,
            payload: row.payload,
        })
    }
}

fn rows_to_events(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<StoredEvent>, EventStoreError> {
    use sqlx::FromRow;

    rows.iter()
        .map(|row| {
            StoredEventRow::from_row(row)
                .map_err(|e| EventStoreError::InvalidAppend(format!("failed to deserialize event row: {e}")))
                .and_then(StoredEvent::try_from)
        })
        .collect()
}

impl EventStore for PostgresEventStore {
    fn commit(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        run_blocking(self.commit_batch(batch))
    }

    fn load_stream(&self, stream: &StreamKey) -> Result<Vec<StoredEvent>, EventStoreError> {
        run_blocking(self.load_stream_async(stream))
    }

    fn load_by_type(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        run_blocking(self.load_by_type_async(aggregate_type))
    }
}
