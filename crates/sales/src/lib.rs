//! Sales orders domain module (event-sourced).
//!
//! This crate contains the order lifecycle state machine and the quote
//! contract it is created from, implemented purely as deterministic domain
//! logic (no IO, no HTTP, no storage).

pub mod order;
pub mod quote;
pub mod status;

pub use order::{
    AllocateOrder, ConfirmOrder, CreateSalesOrder, InvoiceOrder, LineQty, NewOrderLine,
    OrderAllocated, OrderConfirmed, OrderInvoiced, OrderPicked, OrderShipped, PickOrder,
    SalesOrder, SalesOrderCommand, SalesOrderCreated, SalesOrderEvent, SalesOrderLine, ShipOrder,
};
pub use quote::{
    ConvertQuote, Quote, QuoteConversion, QuoteConversionCommand, QuoteConversionEvent,
    QuoteConverted, QuoteLine, QuoteStatus,
};
pub use status::{SalesOrderStatus, Transition};
