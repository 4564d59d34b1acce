//! Audit trail of successful business operations.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use salesflow_core::ActorId;

/// One audited action: who did what to which entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: ActorId,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub detail: String,
}

/// Receives an entry after the operation it describes has committed.
///
/// Recording is fire-and-forget: a sink must not fail the operation.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

impl<A> AuditSink for Arc<A>
where
    A: AuditSink + ?Sized,
{
    fn record(&self, entry: AuditEntry) {
        (**self).record(entry)
    }
}

/// Emits entries as structured log events on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        tracing::info!(
            target: "audit",
            actor = %entry.actor,
            action = %entry.action,
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            "{}",
            entry.detail
        );
    }
}

/// Keeps entries in memory (tests and local runs).
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}
