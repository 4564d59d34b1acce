//! All-or-nothing planning of ledger movements across several records.
//!
//! A multi-line order reserves (or issues) stock on one or more records. The
//! batch runs every movement against scratch copies of the loaded records, so
//! lines sharing an IPN see each other's effect, and nothing reaches the store
//! unless every line passed. On error the caller drops the batch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use salesflow_core::{DomainError, Ipn};
use salesflow_events::execute;

use crate::record::{InventoryCommand, InventoryEvent, InventoryRecord, IssueStock, ReserveStock};

#[derive(Debug)]
struct Planned {
    record: InventoryRecord,
    pending: Vec<InventoryEvent>,
}

/// Staged ledger movements for one unit of work.
#[derive(Debug, Default)]
pub struct LedgerBatch {
    records: BTreeMap<Ipn, Planned>,
}

impl LedgerBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record as loaded from the store. Re-tracking an IPN keeps
    /// the first copy and whatever was already planned against it.
    pub fn track(&mut self, record: InventoryRecord) {
        self.records
            .entry(record.ipn().clone())
            .or_insert(Planned {
                record,
                pending: Vec::new(),
            });
    }

    /// Planned state of a tracked record (after the movements staged so far).
    pub fn record(&self, ipn: &Ipn) -> Option<&InventoryRecord> {
        self.records.get(ipn).map(|p| &p.record)
    }

    pub fn reserve(
        &mut self,
        ipn: &Ipn,
        qty: i64,
        reference: &str,
        notes: String,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let cmd = InventoryCommand::ReserveStock(ReserveStock {
            ipn: ipn.clone(),
            qty,
            reference: reference.to_string(),
            notes,
            occurred_at,
        });
        self.run(ipn, &cmd)
    }

    pub fn issue(
        &mut self,
        ipn: &Ipn,
        qty: i64,
        reference: &str,
        notes: String,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let cmd = InventoryCommand::IssueStock(IssueStock {
            ipn: ipn.clone(),
            qty,
            reference: reference.to_string(),
            notes,
            occurred_at,
        });
        self.run(ipn, &cmd)
    }

    fn run(&mut self, ipn: &Ipn, cmd: &InventoryCommand) -> Result<(), DomainError> {
        let planned = self
            .records
            .get_mut(ipn)
            .ok_or_else(|| DomainError::not_found("inventory", ipn))?;

        let events = execute(&mut planned.record, cmd)?;
        planned.pending.extend(events);
        Ok(())
    }

    /// Staged events per record, in IPN order (records without movements are skipped).
    pub fn into_pending(self) -> Vec<(Ipn, Vec<InventoryEvent>)> {
        self.records
            .into_iter()
            .filter(|(_, p)| !p.pending.is_empty())
            .map(|(ipn, p)| (ipn, p.pending))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ReceiveStock;
    use proptest::prelude::*;
    use salesflow_core::AggregateRoot;

    fn ipn(s: &str) -> Ipn {
        Ipn::new(s).unwrap()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn stocked(code: &str, on_hand: i64) -> InventoryRecord {
        let mut record = InventoryRecord::empty(ipn(code));
        execute(
            &mut record,
            &InventoryCommand::ReceiveStock(ReceiveStock {
                ipn: ipn(code),
                qty: on_hand,
                location: None,
                reference: String::new(),
                notes: String::new(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        record
    }

    #[test]
    fn lines_sharing_an_ipn_accumulate() {
        let mut batch = LedgerBatch::new();
        batch.track(stocked("WIDGET-01", 10));

        batch
            .reserve(&ipn("WIDGET-01"), 6, "SO:SO-0001", "Reserved 6 for SO-0001".into(), test_time())
            .unwrap();
        let err = batch
            .reserve(&ipn("WIDGET-01"), 6, "SO:SO-0001", "Reserved 6 for SO-0001".into(), test_time())
            .unwrap_err();

        assert_eq!(err, DomainError::insufficient("WIDGET-01", 6, 4));
    }

    #[test]
    fn pending_events_are_grouped_per_record() {
        let mut batch = LedgerBatch::new();
        batch.track(stocked("A", 10));
        batch.track(stocked("B", 10));
        batch.track(stocked("C", 10));

        batch.reserve(&ipn("B"), 2, "SO:SO-0001", String::new(), test_time()).unwrap();
        batch.reserve(&ipn("A"), 1, "SO:SO-0001", String::new(), test_time()).unwrap();
        batch.reserve(&ipn("A"), 3, "SO:SO-0001", String::new(), test_time()).unwrap();

        let pending = batch.into_pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].0, ipn("A"));
        assert_eq!(pending[0].1.len(), 2);
        assert_eq!(pending[1].0, ipn("B"));
    }

    #[test]
    fn untracked_ipn_is_not_found() {
        let mut batch = LedgerBatch::new();
        let err = batch
            .issue(&ipn("GHOST"), 1, "SO:SO-0001", String::new(), test_time())
            .unwrap_err();
        match err {
            DomainError::NotFound { entity, .. } if entity == "inventory" => {}
            _ => panic!("Expected NotFound for untracked ipn"),
        }
    }

    #[test]
    fn tracking_twice_keeps_planned_state() {
        let mut batch = LedgerBatch::new();
        batch.track(stocked("A", 10));
        batch.reserve(&ipn("A"), 4, "SO:SO-0001", String::new(), test_time()).unwrap();
        batch.track(stocked("A", 10));

        let record = batch.record(&ipn("A")).unwrap();
        assert_eq!(record.qty_reserved(), 4);
        assert_eq!(record.version(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: a batch either plans every line or fails; the plan never
        /// reserves more than the records had available.
        #[test]
        fn batch_never_over_reserves(
            on_hand in 1i64..40,
            lines in prop::collection::vec(1i64..15, 1..6),
        ) {
            let mut batch = LedgerBatch::new();
            batch.track(stocked("A", on_hand));

            let mut result = Ok(());
            for qty in &lines {
                result = batch.reserve(&ipn("A"), *qty, "SO:SO-0001", String::new(), test_time());
                if result.is_err() {
                    break;
                }
            }

            let requested: i64 = lines.iter().sum();
            prop_assert_eq!(result.is_ok(), requested <= on_hand);

            let record = batch.record(&ipn("A")).unwrap();
            prop_assert!(record.qty_reserved() <= record.qty_on_hand());
        }
    }
}
