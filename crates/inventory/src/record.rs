use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesflow_core::{Aggregate, AggregateRoot, DomainError, Ipn};
use salesflow_events::Event;

/// Aggregate root: InventoryRecord (one per IPN).
///
/// Invariant: `0 <= qty_reserved <= qty_on_hand` after every applied event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRecord {
    ipn: Ipn,
    qty_on_hand: i64,
    qty_reserved: i64,
    location: Option<String>,
    version: u64,
    created: bool,
}

impl InventoryRecord {
    /// Create an empty, not-yet-received record for rehydration.
    pub fn empty(ipn: Ipn) -> Self {
        Self {
            ipn,
            qty_on_hand: 0,
            qty_reserved: 0,
            location: None,
            version: 0,
            created: false,
        }
    }

    pub fn ipn(&self) -> &Ipn {
        &self.ipn
    }

    pub fn qty_on_hand(&self) -> i64 {
        self.qty_on_hand
    }

    pub fn qty_reserved(&self) -> i64 {
        self.qty_reserved
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Available-to-promise: on hand minus reserved.
    pub fn available(&self) -> i64 {
        self.qty_on_hand - self.qty_reserved
    }

    /// Whether stock was ever received for this IPN.
    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for InventoryRecord {
    type Id = Ipn;

    const AGGREGATE_TYPE: &'static str = "inventory.record";

    fn id(&self) -> &Self::Id {
        &self.ipn
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ReceiveStock (creates the record on first receipt).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub ipn: Ipn,
    pub qty: i64,
    pub location: Option<String>,
    pub reference: String,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub ipn: Ipn,
    pub qty: i64,
    pub reference: String,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseStock (gives back a reservation without moving stock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStock {
    pub ipn: Ipn,
    pub qty: i64,
    pub reference: String,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: IssueStock (physical departure of previously reserved stock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStock {
    pub ipn: Ipn,
    pub qty: i64,
    pub reference: String,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    ReceiveStock(ReceiveStock),
    ReserveStock(ReserveStock),
    ReleaseStock(ReleaseStock),
    IssueStock(IssueStock),
}

/// Event: StockReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceived {
    pub ipn: Ipn,
    pub qty: i64,
    pub location: Option<String>,
    pub reference: String,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub ipn: Ipn,
    pub qty: i64,
    pub reference: String,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationReleased {
    pub ipn: Ipn,
    pub qty: i64,
    pub reference: String,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockIssued {
    pub ipn: Ipn,
    pub qty: i64,
    pub reference: String,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    StockReceived(StockReceived),
    StockReserved(StockReserved),
    ReservationReleased(ReservationReleased),
    StockIssued(StockIssued),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::StockReceived(_) => "inventory.stock.received",
            InventoryEvent::StockReserved(_) => "inventory.stock.reserved",
            InventoryEvent::ReservationReleased(_) => "inventory.stock.released",
            InventoryEvent::StockIssued(_) => "inventory.stock.issued",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::StockReceived(e) => e.occurred_at,
            InventoryEvent::StockReserved(e) => e.occurred_at,
            InventoryEvent::ReservationReleased(e) => e.occurred_at,
            InventoryEvent::StockIssued(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryRecord {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::StockReceived(e) => {
                self.ipn = e.ipn.clone();
                self.qty_on_hand += e.qty;
                if e.location.is_some() {
                    self.location = e.location.clone();
                }
                self.created = true;
            }
            InventoryEvent::StockReserved(e) => {
                self.qty_reserved += e.qty;
            }
            InventoryEvent::ReservationReleased(e) => {
                self.qty_reserved -= e.qty;
            }
            InventoryEvent::StockIssued(e) => {
                self.qty_on_hand -= e.qty;
                self.qty_reserved -= e.qty;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::ReceiveStock(cmd) => self.handle_receive(cmd),
            InventoryCommand::ReserveStock(cmd) => self.handle_reserve(cmd),
            InventoryCommand::ReleaseStock(cmd) => self.handle_release(cmd),
            InventoryCommand::IssueStock(cmd) => self.handle_issue(cmd),
        }
    }
}

impl InventoryRecord {
    fn ensure_ipn(&self, ipn: &Ipn) -> Result<(), DomainError> {
        if &self.ipn != ipn {
            return Err(DomainError::invalid_id(format!(
                "command ipn {ipn} does not match record {}",
                self.ipn
            )));
        }
        Ok(())
    }

    fn ensure_movable(&self, ipn: &Ipn, qty: i64) -> Result<(), DomainError> {
        self.ensure_ipn(ipn)?;
        if qty <= 0 {
            return Err(DomainError::validation("qty", "must be positive"));
        }
        if !self.created {
            return Err(DomainError::not_found("inventory", ipn));
        }
        Ok(())
    }

    fn handle_receive(&self, cmd: &ReceiveStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_ipn(&cmd.ipn)?;
        if cmd.qty <= 0 {
            return Err(DomainError::validation("qty", "must be positive"));
        }
        if self.qty_on_hand.checked_add(cmd.qty).is_none() {
            return Err(DomainError::validation(
                "qty",
                format!("receiving {} would overflow on-hand quantity {}", cmd.qty, self.qty_on_hand),
            ));
        }

        Ok(vec![InventoryEvent::StockReceived(StockReceived {
            ipn: cmd.ipn.clone(),
            qty: cmd.qty,
            location: cmd.location.clone(),
            reference: cmd.reference.clone(),
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_movable(&cmd.ipn, cmd.qty)?;

        let available = self.available();
        if available < cmd.qty {
            return Err(DomainError::insufficient(&cmd.ipn, cmd.qty, available));
        }

        Ok(vec![InventoryEvent::StockReserved(StockReserved {
            ipn: cmd.ipn.clone(),
            qty: cmd.qty,
            reference: cmd.reference.clone(),
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_movable(&cmd.ipn, cmd.qty)?;

        if self.qty_reserved < cmd.qty {
            return Err(DomainError::insufficient(&cmd.ipn, cmd.qty, self.qty_reserved));
        }

        Ok(vec![InventoryEvent::ReservationReleased(ReservationReleased {
            ipn: cmd.ipn.clone(),
            qty: cmd.qty,
            reference: cmd.reference.clone(),
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_issue(&self, cmd: &IssueStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_movable(&cmd.ipn, cmd.qty)?;

        // Issuing only consumes reserved stock; reserved <= on hand covers the rest.
        if self.qty_reserved < cmd.qty {
            return Err(DomainError::insufficient(&cmd.ipn, cmd.qty, self.qty_reserved));
        }

        Ok(vec![InventoryEvent::StockIssued(StockIssued {
            ipn: cmd.ipn.clone(),
            qty: cmd.qty,
            reference: cmd.reference.clone(),
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use salesflow_events::execute;

    fn test_ipn() -> Ipn {
        Ipn::new("WIDGET-01").unwrap()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn receive(qty: i64) -> InventoryCommand {
        InventoryCommand::ReceiveStock(ReceiveStock {
            ipn: test_ipn(),
            qty,
            location: Some("A-01".to_string()),
            reference: "PO:PO-0001".to_string(),
            notes: String::new(),
            occurred_at: test_time(),
        })
    }

    fn reserve(qty: i64) -> InventoryCommand {
        InventoryCommand::ReserveStock(ReserveStock {
            ipn: test_ipn(),
            qty,
            reference: "SO:SO-0001".to_string(),
            notes: format!("Reserved {qty} for SO-0001"),
            occurred_at: test_time(),
        })
    }

    fn release(qty: i64) -> InventoryCommand {
        InventoryCommand::ReleaseStock(ReleaseStock {
            ipn: test_ipn(),
            qty,
            reference: "SO:SO-0001".to_string(),
            notes: format!("Released {qty} for SO-0001"),
            occurred_at: test_time(),
        })
    }

    fn issue(qty: i64) -> InventoryCommand {
        InventoryCommand::IssueStock(IssueStock {
            ipn: test_ipn(),
            qty,
            reference: "SO:SO-0001".to_string(),
            notes: format!("Shipped {qty} for SO-0001"),
            occurred_at: test_time(),
        })
    }

    fn stocked(on_hand: i64) -> InventoryRecord {
        let mut record = InventoryRecord::empty(test_ipn());
        execute(&mut record, &receive(on_hand)).unwrap();
        record
    }

    #[test]
    fn receive_creates_record_and_sets_location() {
        let record = stocked(100);
        assert!(record.exists());
        assert_eq!(record.qty_on_hand(), 100);
        assert_eq!(record.qty_reserved(), 0);
        assert_eq!(record.location(), Some("A-01"));
        assert_eq!(record.version(), 1);
    }

    #[test]
    fn reserve_increments_reserved_only() {
        let mut record = stocked(100);
        execute(&mut record, &reserve(10)).unwrap();
        assert_eq!(record.qty_on_hand(), 100);
        assert_eq!(record.qty_reserved(), 10);
        assert_eq!(record.available(), 90);
    }

    #[test]
    fn reserve_beyond_available_reports_required_and_available() {
        let mut record = stocked(5);
        let err = execute(&mut record, &reserve(10)).unwrap_err();
        assert_eq!(err, DomainError::insufficient("WIDGET-01", 10, 5));
        assert_eq!(record.qty_reserved(), 0);
    }

    #[test]
    fn reserve_on_unknown_ipn_is_not_found() {
        let record = InventoryRecord::empty(test_ipn());
        let err = record.handle(&reserve(1)).unwrap_err();
        match err {
            DomainError::NotFound { entity, id } if entity == "inventory" && id == "WIDGET-01" => {}
            _ => panic!("Expected NotFound for unknown ipn"),
        }
    }

    #[test]
    fn issue_consumes_reservation_and_on_hand() {
        let mut record = stocked(100);
        execute(&mut record, &reserve(10)).unwrap();
        execute(&mut record, &issue(10)).unwrap();
        assert_eq!(record.qty_on_hand(), 90);
        assert_eq!(record.qty_reserved(), 0);
    }

    #[test]
    fn issue_without_reservation_is_rejected() {
        let mut record = stocked(100);
        let err = execute(&mut record, &issue(1)).unwrap_err();
        assert_eq!(err, DomainError::insufficient("WIDGET-01", 1, 0));
        assert_eq!(record.qty_on_hand(), 100);
    }

    #[test]
    fn release_returns_capacity() {
        let mut record = stocked(10);
        execute(&mut record, &reserve(10)).unwrap();
        execute(&mut record, &release(4)).unwrap();
        assert_eq!(record.available(), 4);
        assert!(execute(&mut record, &release(7)).is_err());
    }

    #[test]
    fn receive_that_would_overflow_on_hand_is_rejected() {
        let mut record = stocked(i64::MAX);
        match execute(&mut record, &receive(1)).unwrap_err() {
            DomainError::Validation(fields) => assert_eq!(fields[0].field, "qty"),
            other => panic!("Expected Validation, got {other:?}"),
        }
        assert_eq!(record.qty_on_hand(), i64::MAX);
        assert_eq!(record.version(), 1);
    }

    #[test]
    fn non_positive_quantities_are_validation_errors() {
        let record = stocked(10);
        for cmd in [receive(0), reserve(-1), issue(0), release(0)] {
            match record.handle(&cmd).unwrap_err() {
                DomainError::Validation(fields) => assert_eq!(fields[0].field, "qty"),
                other => panic!("Expected Validation, got {other:?}"),
            }
        }
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let record = stocked(10);
        let before = record.clone();
        let _ = record.handle(&reserve(3)).unwrap();
        let _ = record.handle(&reserve(3)).unwrap();
        assert_eq!(record, before);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Receive(i64),
        Reserve(i64),
        Release(i64),
        Issue(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..50).prop_map(Op::Receive),
            (1i64..80).prop_map(Op::Reserve),
            (1i64..40).prop_map(Op::Release),
            (1i64..60).prop_map(Op::Issue),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of movements is attempted, accepted ones
        /// never push reserved above on hand or either counter below zero.
        #[test]
        fn reserved_never_exceeds_on_hand(ops in prop::collection::vec(op_strategy(), 1..60)) {
            let mut record = stocked(20);

            for op in ops {
                let cmd = match op {
                    Op::Receive(q) => receive(q),
                    Op::Reserve(q) => reserve(q),
                    Op::Release(q) => release(q),
                    Op::Issue(q) => issue(q),
                };
                let before = record.clone();
                if execute(&mut record, &cmd).is_err() {
                    prop_assert_eq!(&record, &before);
                }

                prop_assert!(record.qty_reserved() >= 0);
                prop_assert!(record.qty_reserved() <= record.qty_on_hand());
            }
        }
    }
}
