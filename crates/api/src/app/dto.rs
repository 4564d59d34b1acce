use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use salesflow_core::{AggregateRoot, DomainError, FieldError, Money};
use salesflow_documents::{Invoice, Shipment, ShipmentLine, ShipmentStatus, ShipmentType};
use salesflow_infra::projections::OrderSummary;
use salesflow_infra::{NewSalesOrder, StockReceipt};
use salesflow_inventory::InventoryRecord;
use salesflow_sales::{NewOrderLine, SalesOrder, SalesOrderLine, SalesOrderStatus};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateSalesOrderRequest {
    #[serde(default)]
    pub customer: String,
    pub notes: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub ipn: String,
    pub description: Option<String>,
    pub qty: i64,
    /// Decimal amount, rounded to the nearest cent.
    pub unit_price: f64,
    pub notes: Option<String>,
}

impl CreateSalesOrderRequest {
    pub fn into_new_order(self) -> Result<NewSalesOrder, DomainError> {
        let mut errors = Vec::new();
        let mut lines = Vec::with_capacity(self.lines.len());
        for (i, line) in self.lines.into_iter().enumerate() {
            let Some(unit_price) = Money::from_decimal(line.unit_price) else {
                errors.push(FieldError::new(format!("lines[{i}].unit_price"), "is not a valid amount"));
                continue;
            };
            lines.push(NewOrderLine {
                ipn: line.ipn,
                description: line.description.unwrap_or_default(),
                qty: line.qty,
                unit_price,
                notes: line.notes.unwrap_or_default(),
            });
        }
        if !errors.is_empty() {
            return Err(DomainError::Validation(errors));
        }

        Ok(NewSalesOrder {
            customer: self.customer,
            notes: self.notes.unwrap_or_default(),
            status: self.status,
            lines,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
    pub customer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveStockRequest {
    pub qty: i64,
    pub location: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

impl From<ReceiveStockRequest> for StockReceipt {
    fn from(req: ReceiveStockRequest) -> Self {
        StockReceipt {
            qty: req.qty,
            location: req.location.filter(|l| !l.trim().is_empty()),
            reference: req.reference.unwrap_or_default(),
            notes: req.notes.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReleaseStockRequest {
    pub qty: i64,
    pub reference: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct SalesOrderResponse {
    pub id: String,
    pub quote_id: Option<String>,
    pub customer: String,
    pub status: SalesOrderStatus,
    pub notes: String,
    pub lines: Vec<SalesOrderLineResponse>,
    pub total: Option<f64>,
    pub shipment_id: Option<String>,
    pub invoice_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SalesOrderLineResponse {
    pub line_no: u32,
    pub ipn: String,
    pub description: String,
    pub qty: i64,
    pub qty_allocated: i64,
    pub qty_picked: i64,
    pub qty_shipped: i64,
    pub unit_price: f64,
    pub line_total: Option<f64>,
    pub notes: String,
}

impl From<&SalesOrderLine> for SalesOrderLineResponse {
    fn from(l: &SalesOrderLine) -> Self {
        Self {
            line_no: l.line_no,
            ipn: l.ipn.to_string(),
            description: l.description.clone(),
            qty: l.qty,
            qty_allocated: l.qty_allocated,
            qty_picked: l.qty_picked,
            qty_shipped: l.qty_shipped,
            unit_price: l.unit_price.as_decimal(),
            line_total: l.line_total().map(Money::as_decimal),
            notes: l.notes.clone(),
        }
    }
}

impl From<&SalesOrder> for SalesOrderResponse {
    fn from(o: &SalesOrder) -> Self {
        Self {
            id: o.order_id().to_string(),
            quote_id: o.quote_id().map(ToString::to_string),
            customer: o.customer().to_string(),
            status: o.status(),
            notes: o.notes().to_string(),
            lines: o.lines().iter().map(SalesOrderLineResponse::from).collect(),
            total: o.total().map(Money::as_decimal),
            shipment_id: o.shipment_id().map(ToString::to_string),
            invoice_id: o.invoice_id().map(ToString::to_string),
            created_by: o.created_by().map(ToString::to_string),
            created_at: o.created_at(),
            updated_at: o.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderSummaryResponse {
    pub id: String,
    pub quote_id: Option<String>,
    pub customer: String,
    pub status: SalesOrderStatus,
    pub line_count: usize,
    pub total: f64,
    pub shipment_id: Option<String>,
    pub invoice_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderSummary> for OrderSummaryResponse {
    fn from(s: OrderSummary) -> Self {
        Self {
            id: s.id.to_string(),
            quote_id: s.quote_id.map(|q| q.to_string()),
            customer: s.customer,
            status: s.status,
            line_count: s.line_count,
            total: s.total.as_decimal(),
            shipment_id: s.shipment_id.map(|id| id.to_string()),
            invoice_id: s.invoice_id.map(|id| id.to_string()),
            created_by: s.created_by.to_string(),
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InventoryResponse {
    pub ipn: String,
    pub qty_on_hand: i64,
    pub qty_reserved: i64,
    pub available: i64,
    pub location: Option<String>,
}

impl From<&InventoryRecord> for InventoryResponse {
    fn from(r: &InventoryRecord) -> Self {
        Self {
            ipn: r.ipn().to_string(),
            qty_on_hand: r.qty_on_hand(),
            qty_reserved: r.qty_reserved(),
            available: r.available(),
            location: r.location().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShipmentResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub shipment_type: ShipmentType,
    pub status: ShipmentStatus,
    pub to_address: String,
    pub notes: String,
    pub lines: Vec<ShipmentLine>,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Shipment> for ShipmentResponse {
    fn from(s: &Shipment) -> Self {
        Self {
            id: s.id().to_string(),
            shipment_type: s.shipment_type(),
            status: s.status(),
            to_address: s.to_address().to_string(),
            notes: s.notes().to_string(),
            lines: s.lines().to_vec(),
            created_by: s.created_by().map(ToString::to_string),
            created_at: s.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub invoice_number: String,
    pub sales_order_id: Option<String>,
    pub customer: String,
    pub status: salesflow_documents::InvoiceStatus,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub lines: Vec<InvoiceLineResponse>,
    pub total: f64,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceLineResponse {
    pub line_no: u32,
    pub ipn: String,
    pub description: String,
    pub qty: i64,
    pub unit_price: f64,
    pub line_total: f64,
}

impl From<&Invoice> for InvoiceResponse {
    fn from(i: &Invoice) -> Self {
        Self {
            invoice_number: i.invoice_number().to_string(),
            sales_order_id: i.sales_order_id().map(ToString::to_string),
            customer: i.customer().to_string(),
            status: i.status(),
            issue_date: i.issue_date(),
            due_date: i.due_date(),
            lines: i
                .lines()
                .iter()
                .map(|l| InvoiceLineResponse {
                    line_no: l.line_no,
                    ipn: l.ipn.to_string(),
                    description: l.description.clone(),
                    qty: l.qty,
                    unit_price: l.unit_price.as_decimal(),
                    line_total: l.line_total.as_decimal(),
                })
                .collect(),
            total: i.total().as_decimal(),
            created_by: i.created_by().map(ToString::to_string),
            created_at: i.created_at(),
        }
    }
}
