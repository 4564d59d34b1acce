use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use salesflow_core::{ActorId, Aggregate, AggregateRoot, DomainError, InvoiceId, Ipn, Money, OrderId};
use salesflow_events::Event;

/// Invoice status at creation.
///
/// Sending and payment tracking live in the invoicing service and are
/// independent of the order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
}

/// Snapshot of one order line at invoicing time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub line_no: u32,
    pub ipn: Ipn,
    pub description: String,
    pub qty: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    sales_order_id: Option<OrderId>,
    customer: String,
    status: InvoiceStatus,
    issue_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    lines: Vec<InvoiceLine>,
    total: Money,
    created_by: Option<ActorId>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            sales_order_id: None,
            customer: String::new(),
            status: InvoiceStatus::Draft,
            issue_date: None,
            due_date: None,
            lines: Vec::new(),
            total: Money::ZERO,
            created_by: None,
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    /// Invoice number as printed; identical to the invoice id.
    pub fn invoice_number(&self) -> &str {
        self.id.as_str()
    }

    pub fn sales_order_id(&self) -> Option<&OrderId> {
        self.sales_order_id.as_ref()
    }

    pub fn customer(&self) -> &str {
        &self.customer
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn issue_date(&self) -> Option<NaiveDate> {
        self.issue_date
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn created_by(&self) -> Option<&ActorId> {
        self.created_by.as_ref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    const AGGREGATE_TYPE: &'static str = "documents.invoice";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub invoice_id: InvoiceId,
    pub sales_order_id: OrderId,
    pub customer: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub lines: Vec<InvoiceLine>,
    pub total: Money,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    CreateInvoice(CreateInvoice),
}

/// Event: InvoiceCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCreated {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub sales_order_id: OrderId,
    pub customer: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub lines: Vec<InvoiceLine>,
    pub total: Money,
    pub created_by: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceCreated(InvoiceCreated),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceCreated(_) => "documents.invoice.created",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceCreated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceCreated(e) => {
                self.id = e.invoice_id.clone();
                self.sales_order_id = Some(e.sales_order_id.clone());
                self.customer = e.customer.clone();
                self.status = e.status;
                self.issue_date = Some(e.issue_date);
                self.due_date = Some(e.due_date);
                self.lines = e.lines.clone();
                self.total = e.total;
                self.created_by = Some(e.created_by.clone());
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::CreateInvoice(cmd) => self.handle_create(cmd),
        }
    }
}

impl Invoice {
    fn handle_create(&self, cmd: &CreateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!(
                "invoice {} already exists",
                cmd.invoice_id
            )));
        }
        if cmd.due_date < cmd.issue_date {
            return Err(DomainError::validation("due_date", "must not precede issue_date"));
        }

        let summed = cmd
            .lines
            .iter()
            .try_fold(Money::ZERO, |acc, l| acc.checked_add(l.line_total));
        if summed != Some(cmd.total) {
            return Err(DomainError::validation("total", "does not match line totals"));
        }

        Ok(vec![InvoiceEvent::InvoiceCreated(InvoiceCreated {
            invoice_id: cmd.invoice_id.clone(),
            invoice_number: cmd.invoice_id.to_string(),
            sales_order_id: cmd.sales_order_id.clone(),
            customer: cmd.customer.clone(),
            status: InvoiceStatus::Draft,
            issue_date: cmd.issue_date,
            due_date: cmd.due_date,
            lines: cmd.lines.clone(),
            total: cmd.total,
            created_by: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesflow_events::execute;

    fn test_invoice_id() -> InvoiceId {
        InvoiceId::new("INV-0001").unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_cmd(total: Money) -> InvoiceCommand {
        InvoiceCommand::CreateInvoice(CreateInvoice {
            invoice_id: test_invoice_id(),
            sales_order_id: OrderId::new("SO-0001").unwrap(),
            customer: "Acme".to_string(),
            issue_date: date(2026, 1, 10),
            due_date: date(2026, 2, 9),
            lines: vec![InvoiceLine {
                line_no: 1,
                ipn: Ipn::new("WIDGET-01").unwrap(),
                description: "Widget".to_string(),
                qty: 10,
                unit_price: Money::from_cents(2_500),
                line_total: Money::from_cents(25_000),
            }],
            total,
            actor: ActorId::new("alice").unwrap(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn create_emits_draft_invoice_numbered_by_id() {
        let mut invoice = Invoice::empty(test_invoice_id());
        execute(&mut invoice, &create_cmd(Money::from_cents(25_000))).unwrap();

        assert!(invoice.exists());
        assert_eq!(invoice.invoice_number(), "INV-0001");
        assert_eq!(invoice.status(), InvoiceStatus::Draft);
        assert_eq!(invoice.total().to_string(), "250.00");
        assert_eq!(invoice.sales_order_id().unwrap().as_str(), "SO-0001");
    }

    #[test]
    fn total_must_match_lines() {
        let invoice = Invoice::empty(test_invoice_id());
        match invoice.handle(&create_cmd(Money::from_cents(1))).unwrap_err() {
            DomainError::Validation(fields) => assert_eq!(fields[0].field, "total"),
            other => panic!("Expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn invoice_is_created_once() {
        let mut invoice = Invoice::empty(test_invoice_id());
        execute(&mut invoice, &create_cmd(Money::from_cents(25_000))).unwrap();
        assert!(matches!(
            invoice.handle(&create_cmd(Money::from_cents(25_000))),
            Err(DomainError::Conflict(_))
        ));
    }
}
