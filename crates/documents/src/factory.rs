//! Pure derivation of shipments and invoices from an order.
//!
//! The factory copies quantities and computes the invoice total; it makes no
//! business decisions. The caller runs the returned commands against fresh
//! aggregates and commits them with the order transition.

use chrono::{DateTime, Duration, Utc};

use salesflow_core::{ActorId, AggregateRoot, DomainError, InvoiceId, Money, ShipmentId};
use salesflow_sales::SalesOrder;

use crate::invoice::{CreateInvoice, InvoiceCommand, InvoiceLine};
use crate::shipment::{CreateShipment, ShipmentCommand, ShipmentLine, ShipmentType};

pub const DEFAULT_INVOICE_TERMS_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentFactory {
    invoice_terms_days: u32,
}

impl Default for DocumentFactory {
    fn default() -> Self {
        Self::new(DEFAULT_INVOICE_TERMS_DAYS)
    }
}

impl DocumentFactory {
    pub fn new(invoice_terms_days: u32) -> Self {
        Self { invoice_terms_days }
    }

    /// One shipment line per order line, carrying the picked quantity.
    pub fn shipment_for(
        &self,
        order: &SalesOrder,
        shipment_id: ShipmentId,
        actor: &ActorId,
        occurred_at: DateTime<Utc>,
    ) -> ShipmentCommand {
        let order_id = order.id().clone();
        let lines = order
            .lines()
            .iter()
            .enumerate()
            .map(|(idx, l)| ShipmentLine {
                line_no: idx as u32 + 1,
                ipn: l.ipn.clone(),
                qty: l.qty_picked,
                sales_order_id: order_id.clone(),
                order_line_no: l.line_no,
            })
            .collect();

        ShipmentCommand::CreateShipment(CreateShipment {
            shipment_id,
            shipment_type: ShipmentType::Outbound,
            to_address: order.customer().to_string(),
            notes: format!("Shipment for {order_id}"),
            lines,
            actor: actor.clone(),
            occurred_at,
        })
    }

    /// Invoice snapshot: total = Σ(qty × unit price), due after the configured terms.
    pub fn invoice_for(
        &self,
        order: &SalesOrder,
        invoice_id: InvoiceId,
        actor: &ActorId,
        occurred_at: DateTime<Utc>,
    ) -> Result<InvoiceCommand, DomainError> {
        let order_id = order.id().clone();

        let mut lines = Vec::with_capacity(order.lines().len());
        let mut total = Money::ZERO;
        for l in order.lines() {
            let line_total = l
                .line_total()
                .ok_or_else(|| DomainError::validation("total", "amount out of range"))?;
            total = total
                .checked_add(line_total)
                .ok_or_else(|| DomainError::validation("total", "amount out of range"))?;
            lines.push(InvoiceLine {
                line_no: l.line_no,
                ipn: l.ipn.clone(),
                description: l.description.clone(),
                qty: l.qty,
                unit_price: l.unit_price,
                line_total,
            });
        }

        let issue_date = occurred_at.date_naive();
        let due_date = issue_date + Duration::days(i64::from(self.invoice_terms_days));

        Ok(InvoiceCommand::CreateInvoice(CreateInvoice {
            invoice_id,
            sales_order_id: order_id,
            customer: order.customer().to_string(),
            issue_date,
            due_date,
            lines,
            total,
            actor: actor.clone(),
            occurred_at,
        }))
    }
}
