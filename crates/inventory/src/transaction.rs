//! Inventory transaction log entries.
//!
//! The log is a pure function of the record's event stream: one entry per
//! event, never mutated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesflow_core::Ipn;

use crate::record::InventoryEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Receive,
    /// Reservation bookkeeping; the physical count does not move.
    Adjust,
    Issue,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Receive => "receive",
            TransactionType::Adjust => "adjust",
            TransactionType::Issue => "issue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub ipn: Ipn,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Quantity delta recorded for the movement (0 for reservations).
    pub qty: i64,
    pub reference: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl From<&InventoryEvent> for InventoryTransaction {
    fn from(event: &InventoryEvent) -> Self {
        match event {
            InventoryEvent::StockReceived(e) => Self {
                ipn: e.ipn.clone(),
                transaction_type: TransactionType::Receive,
                qty: e.qty,
                reference: e.reference.clone(),
                notes: e.notes.clone(),
                created_at: e.occurred_at,
            },
            InventoryEvent::StockReserved(e) => Self {
                ipn: e.ipn.clone(),
                transaction_type: TransactionType::Adjust,
                qty: 0,
                reference: e.reference.clone(),
                notes: e.notes.clone(),
                created_at: e.occurred_at,
            },
            InventoryEvent::ReservationReleased(e) => Self {
                ipn: e.ipn.clone(),
                transaction_type: TransactionType::Adjust,
                qty: 0,
                reference: e.reference.clone(),
                notes: e.notes.clone(),
                created_at: e.occurred_at,
            },
            InventoryEvent::StockIssued(e) => Self {
                ipn: e.ipn.clone(),
                transaction_type: TransactionType::Issue,
                qty: e.qty,
                reference: e.reference.clone(),
                notes: e.notes.clone(),
                created_at: e.occurred_at,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{StockIssued, StockReserved};

    #[test]
    fn reservation_is_logged_as_zero_delta_adjust() {
        let event = InventoryEvent::StockReserved(StockReserved {
            ipn: Ipn::new("WIDGET-01").unwrap(),
            qty: 10,
            reference: "SO:SO-0001".to_string(),
            notes: "Reserved 10 for SO-0001".to_string(),
            occurred_at: Utc::now(),
        });

        let tx = InventoryTransaction::from(&event);
        assert_eq!(tx.transaction_type, TransactionType::Adjust);
        assert_eq!(tx.qty, 0);
        assert_eq!(tx.reference, "SO:SO-0001");
    }

    #[test]
    fn issue_is_logged_with_quantity() {
        let event = InventoryEvent::StockIssued(StockIssued {
            ipn: Ipn::new("WIDGET-01").unwrap(),
            qty: 10,
            reference: "SO:SO-0001".to_string(),
            notes: "Shipped 10 for SO-0001".to_string(),
            occurred_at: Utc::now(),
        });

        let tx = InventoryTransaction::from(&event);
        assert_eq!(tx.transaction_type.as_str(), "issue");
        assert_eq!(tx.qty, 10);
    }
}
