//! Order Repository: strongly consistent reads by id.
//!
//! Every read rehydrates the aggregate from its stream. Writes go through a
//! `UnitOfWork` so they can be committed together with ledger movements.

use salesflow_core::{DomainError, InvoiceId, OrderId, ShipmentId};
use salesflow_documents::{Invoice, Shipment};
use salesflow_sales::{SalesOrder, SalesOrderLine};

use crate::error::LifecycleResult;
use crate::event_store::EventStore;
use crate::unit_of_work::load_aggregate;

pub struct OrderRepository<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> OrderRepository<'a, S>
where
    S: EventStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn get(&self, order_id: &OrderId) -> LifecycleResult<SalesOrder> {
        let order = load_aggregate(self.store, SalesOrder::empty(order_id.clone()))?;
        if !order.exists() {
            return Err(DomainError::not_found("sales order", order_id).into());
        }
        Ok(order)
    }

    /// One line of an order, by its 1-based line number.
    pub fn line(&self, order_id: &OrderId, line_no: u32) -> LifecycleResult<SalesOrderLine> {
        let order = self.get(order_id)?;
        order
            .line(line_no)
            .cloned()
            .ok_or_else(|| DomainError::not_found("sales order line", format!("{order_id}#{line_no}")).into())
    }

    pub fn shipment(&self, shipment_id: &ShipmentId) -> LifecycleResult<Shipment> {
        let shipment = load_aggregate(self.store, Shipment::empty(shipment_id.clone()))?;
        if !shipment.exists() {
            return Err(DomainError::not_found("shipment", shipment_id).into());
        }
        Ok(shipment)
    }

    pub fn invoice(&self, invoice_id: &InvoiceId) -> LifecycleResult<Invoice> {
        let invoice = load_aggregate(self.store, Invoice::empty(invoice_id.clone()))?;
        if !invoice.exists() {
            return Err(DomainError::not_found("invoice", invoice_id).into());
        }
        Ok(invoice)
    }
}
