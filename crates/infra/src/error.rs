//! Errors surfaced by the fulfillment services.

use thiserror::Error;

use salesflow_core::DomainError;

use crate::event_store::EventStoreError;

/// Failure of a lifecycle, inventory or read operation.
///
/// Domain failures are deterministic and nothing was written. Storage
/// failures mean nothing was written either: a commit is all or nothing.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage error: {0}")]
    Storage(#[from] EventStoreError),

    /// A stored payload no longer matches its event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),
}

impl LifecycleError {
    /// Stable machine-readable error code.
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::Domain(e) => e.kind(),
            LifecycleError::Storage(_) | LifecycleError::Deserialize(_) => "storage_error",
        }
    }

    /// A stream moved under us; the whole attempt may be retried.
    pub fn is_concurrency(&self) -> bool {
        matches!(self, LifecycleError::Storage(e) if e.is_concurrency())
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            LifecycleError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_error_taxonomy() {
        let not_found: LifecycleError = DomainError::not_found("sales order", "SO-9999").into();
        assert_eq!(not_found.kind(), "not_found");

        let short: LifecycleError = DomainError::insufficient("WIDGET-01", 10, 4).into();
        assert_eq!(short.kind(), "insufficient_inventory");

        let raced: LifecycleError = EventStoreError::Concurrency("stale".into()).into();
        assert_eq!(raced.kind(), "storage_error");
        assert!(raced.is_concurrency());

        let down: LifecycleError = EventStoreError::Unavailable("db down".into()).into();
        assert!(!down.is_concurrency());
    }
}
