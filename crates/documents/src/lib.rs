//! Derived fulfillment documents: shipments and invoices.
//!
//! Both are independent aggregates created exactly once by an order
//! transition. The order links to them by id; it does not own them.

pub mod factory;
pub mod invoice;
pub mod shipment;

pub use factory::DocumentFactory;
pub use invoice::{
    CreateInvoice, Invoice, InvoiceCommand, InvoiceCreated, InvoiceEvent, InvoiceLine,
    InvoiceStatus,
};
pub use shipment::{
    CreateShipment, Shipment, ShipmentCommand, ShipmentCreated, ShipmentEvent, ShipmentLine,
    ShipmentStatus, ShipmentType,
};
