//! Inventory service: receipts, manual releases and ledger reads.
//!
//! Order-driven reservations and issues are planned by the lifecycle
//! controller so they commit with the order transition; this service covers
//! the movements that stand on their own.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use salesflow_core::{ActorId, DomainError, Ipn};
use salesflow_events::execute;
use salesflow_inventory::{
    InventoryCommand, InventoryEvent, InventoryRecord, InventoryTransaction, ReceiveStock,
    ReleaseStock,
};

use crate::audit::{AuditEntry, AuditSink};
use crate::error::{LifecycleError, LifecycleResult};
use crate::event_store::EventStore;
use crate::unit_of_work::{load_aggregate, stream_key, UnitOfWork};

/// Input for a stock receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockReceipt {
    pub qty: i64,
    pub location: Option<String>,
    pub reference: String,
    pub notes: String,
}

pub struct InventoryService<S> {
    store: S,
    audit: Arc<dyn AuditSink>,
    max_commit_attempts: u32,
}

impl<S> InventoryService<S>
where
    S: EventStore,
{
    pub fn new(store: S, audit: Arc<dyn AuditSink>, max_commit_attempts: u32) -> Self {
        Self {
            store,
            audit,
            max_commit_attempts: max_commit_attempts.max(1),
        }
    }

    /// Add stock on hand, creating the record on first receipt.
    #[instrument(skip(self, receipt), fields(ipn = %ipn, qty = receipt.qty, actor = %actor), err)]
    pub fn receive(&self, ipn: &Ipn, receipt: StockReceipt, actor: &ActorId) -> LifecycleResult<InventoryRecord> {
        let record = self.run(ipn, |_| {
            InventoryCommand::ReceiveStock(ReceiveStock {
                ipn: ipn.clone(),
                qty: receipt.qty,
                location: receipt.location.clone(),
                reference: receipt.reference.clone(),
                notes: receipt.notes.clone(),
                occurred_at: Utc::now(),
            })
        })?;

        self.audit.record(AuditEntry {
            actor: actor.clone(),
            action: "receive".to_string(),
            entity_type: "inventory".to_string(),
            entity_id: ipn.to_string(),
            detail: format!("Received {} of {ipn}", receipt.qty),
        });
        Ok(record)
    }

    /// Give back part of a reservation without moving stock.
    #[instrument(skip(self), fields(ipn = %ipn, actor = %actor), err)]
    pub fn release(&self, ipn: &Ipn, qty: i64, reference: &str, actor: &ActorId) -> LifecycleResult<InventoryRecord> {
        let record = self.run(ipn, |_| {
            InventoryCommand::ReleaseStock(ReleaseStock {
                ipn: ipn.clone(),
                qty,
                reference: reference.to_string(),
                notes: format!("Released {qty} for {reference}"),
                occurred_at: Utc::now(),
            })
        })?;

        self.audit.record(AuditEntry {
            actor: actor.clone(),
            action: "release".to_string(),
            entity_type: "inventory".to_string(),
            entity_id: ipn.to_string(),
            detail: format!("Released {qty} of {ipn} for {reference}"),
        });
        Ok(record)
    }

    pub fn get(&self, ipn: &Ipn) -> LifecycleResult<InventoryRecord> {
        let record = load_aggregate(&self.store, InventoryRecord::empty(ipn.clone()))?;
        if !record.exists() {
            return Err(DomainError::not_found("inventory", ipn).into());
        }
        Ok(record)
    }

    /// Transaction log for one IPN, newest first.
    pub fn history(&self, ipn: &Ipn) -> LifecycleResult<Vec<InventoryTransaction>> {
        let stored = self.store.load_stream(&stream_key::<InventoryRecord>(ipn))?;
        if stored.is_empty() {
            return Err(DomainError::not_found("inventory", ipn).into());
        }

        let mut log = stored
            .iter()
            .map(|e| {
                serde_json::from_value::<InventoryEvent>(e.payload.clone())
                    .map(|ev| InventoryTransaction::from(&ev))
                    .map_err(|err| LifecycleError::Deserialize(format!("{} #{}: {err}", e.event_type, e.sequence_number)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        log.reverse();
        Ok(log)
    }

    /// Load, decide, commit; retried on optimistic conflicts.
    fn run(
        &self,
        ipn: &Ipn,
        command: impl Fn(&InventoryRecord) -> InventoryCommand,
    ) -> LifecycleResult<InventoryRecord> {
        let mut attempt = 1;
        loop {
            let mut uow = UnitOfWork::new(&self.store);
            let result = uow
                .load(InventoryRecord::empty(ipn.clone()))
                .and_then(|mut record| {
                    let cmd = command(&record);
                    let events = execute(&mut record, &cmd)?;
                    uow.stage::<InventoryRecord>(ipn, &events)?;
                    Ok(record)
                })
                .and_then(|record| uow.commit().map(|_| record));

            match result {
                Err(err) if err.is_concurrency() && attempt < self.max_commit_attempts => {
                    tracing::warn!(ipn = %ipn, attempt, error = %err, "inventory commit conflict, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
