//! Human-readable document numbers (`SO-0001`, `SH-0001`, `INV-0001`).
//!
//! Numbers are allocated per prefix and never reused. A number drawn by an
//! attempt that later fails is simply skipped, so sequences may have gaps.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sqlx::{PgPool, Row};

use crate::event_store::postgres::{map_sqlx_error, run_blocking};
use crate::event_store::EventStoreError;

/// Allocates the next id for a prefix.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, prefix: &str, width: usize) -> Result<String, EventStoreError>;
}

impl<G> IdGenerator for Arc<G>
where
    G: IdGenerator + ?Sized,
{
    fn next_id(&self, prefix: &str, width: usize) -> Result<String, EventStoreError> {
        (**self).next_id(prefix, width)
    }
}

/// `PREFIX-` followed by the number zero-padded to `width` digits.
pub fn format_id(prefix: &str, n: u64, width: usize) -> String {
    format!("{prefix}-{n:0width$}")
}

#[derive(Debug, Default)]
pub struct InMemorySequenceGenerator {
    counters: Mutex<HashMap<String, u64>>,
}

impl InMemorySequenceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue an existing numbering: the next id for `prefix` will be `last + 1`.
    pub fn with_last(self, prefix: &str, last: u64) -> Self {
        if let Ok(mut counters) = self.counters.lock() {
            counters.insert(prefix.to_string(), last);
        }
        self
    }
}

impl IdGenerator for InMemorySequenceGenerator {
    fn next_id(&self, prefix: &str, width: usize) -> Result<String, EventStoreError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| EventStoreError::Unavailable("id sequence lock poisoned".to_string()))?;
        let n = counters.entry(prefix.to_string()).or_insert(0);
        *n += 1;
        Ok(format_id(prefix, *n, width))
    }
}

/// Sequences kept in the `id_sequences` table; the upsert makes allocation
/// safe across processes.
#[derive(Debug, Clone)]
pub struct PostgresSequenceGenerator {
    pool: PgPool,
}

impl PostgresSequenceGenerator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn next_value(&self, prefix: &str) -> Result<u64, EventStoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO id_sequences (prefix, last_value)
            VALUES ($1, 1)
            ON CONFLICT (prefix)
            DO UPDATE SET last_value = id_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(prefix)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("next_id", e))?;

        let value: i64 = row
            .try_get("last_value")
            .map_err(|e| EventStoreError::InvalidAppend(format!("failed to read last_value: {e}")))?;
        Ok(value as u64)
    }
}

impl IdGenerator for PostgresSequenceGenerator {
    fn next_id(&self, prefix: &str, width: usize) -> Result<String, EventStoreError> {
        let n = run_blocking(self.next_value(prefix))?;
        Ok(format_id(prefix, n, width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_zero_padded_per_prefix() {
        let ids = InMemorySequenceGenerator::new();
        assert_eq!(ids.next_id("SO", 4).unwrap(), "SO-0001");
        assert_eq!(ids.next_id("SO", 4).unwrap(), "SO-0002");
        assert_eq!(ids.next_id("INV", 4).unwrap(), "INV-0001");
    }

    #[test]
    fn width_is_a_minimum() {
        assert_eq!(format_id("SH", 12345, 4), "SH-12345");
        assert_eq!(format_id("SH", 7, 0), "SH-7");
    }

    #[test]
    fn numbering_can_continue_from_existing_documents() {
        let ids = InMemorySequenceGenerator::new().with_last("SO", 41);
        assert_eq!(ids.next_id("SO", 4).unwrap(), "SO-0042");
    }
}
