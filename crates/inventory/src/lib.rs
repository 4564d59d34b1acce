//! Inventory ledger domain module (event-sourced).
//!
//! Tracks on-hand and reserved quantity per inventory part number and logs every
//! movement as an immutable transaction. Pure domain logic: no IO, no storage.

pub mod ledger;
pub mod record;
pub mod transaction;

pub use ledger::LedgerBatch;
pub use record::{
    InventoryCommand, InventoryEvent, InventoryRecord, IssueStock, ReceiveStock, ReleaseStock,
    ReservationReleased, ReserveStock, StockIssued, StockReceived, StockReserved,
};
pub use transaction::{InventoryTransaction, TransactionType};
