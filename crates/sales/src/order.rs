use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesflow_core::{
    ActorId, Aggregate, AggregateRoot, DomainError, FieldError, InvoiceId, Ipn, Money, OrderId,
    QuoteId, ShipmentId,
};
use salesflow_events::Event;

use crate::status::{SalesOrderStatus, Transition};

/// Order line.
///
/// Invariant: `0 <= qty_shipped <= qty_picked <= qty_allocated <= qty`, and the
/// three progress counters never decrease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderLine {
    /// 1-based position; the line's identity within its order.
    pub line_no: u32,
    pub ipn: Ipn,
    pub description: String,
    pub qty: i64,
    pub qty_allocated: i64,
    pub qty_picked: i64,
    pub qty_shipped: i64,
    pub unit_price: Money,
    pub notes: String,
}

impl SalesOrderLine {
    /// `qty × unit_price`, `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.qty)
    }
}

/// Unvalidated line input for order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub ipn: String,
    pub description: String,
    pub qty: i64,
    pub unit_price: Money,
    pub notes: String,
}

/// Quantity recorded against one order line by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineQty {
    pub line_no: u32,
    pub qty: i64,
}

/// Aggregate root: SalesOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrder {
    id: OrderId,
    quote_id: Option<QuoteId>,
    customer: String,
    status: SalesOrderStatus,
    notes: String,
    created_by: Option<ActorId>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    lines: Vec<SalesOrderLine>,
    shipment_id: Option<ShipmentId>,
    invoice_id: Option<InvoiceId>,
    version: u64,
    created: bool,
}

impl SalesOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            quote_id: None,
            customer: String::new(),
            status: SalesOrderStatus::Draft,
            notes: String::new(),
            created_by: None,
            created_at: None,
            updated_at: None,
            lines: Vec::new(),
            shipment_id: None,
            invoice_id: None,
            version: 0,
            created: false,
        }
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn order_id(&self) -> &OrderId {
        &self.id
    }

    pub fn quote_id(&self) -> Option<&QuoteId> {
        self.quote_id.as_ref()
    }

    pub fn customer(&self) -> &str {
        &self.customer
    }

    pub fn status(&self) -> SalesOrderStatus {
        self.status
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn created_by(&self) -> Option<&ActorId> {
        self.created_by.as_ref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn lines(&self) -> &[SalesOrderLine] {
        &self.lines
    }

    pub fn line(&self, line_no: u32) -> Option<&SalesOrderLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }

    pub fn shipment_id(&self) -> Option<&ShipmentId> {
        self.shipment_id.as_ref()
    }

    pub fn invoice_id(&self) -> Option<&InvoiceId> {
        self.invoice_id.as_ref()
    }

    /// Σ(qty × unit price) over all lines, `None` on overflow.
    pub fn total(&self) -> Option<Money> {
        self.lines
            .iter()
            .try_fold(Money::ZERO, |acc, l| acc.checked_add(l.line_total()?))
    }
}

impl AggregateRoot for SalesOrder {
    type Id = OrderId;

    const AGGREGATE_TYPE: &'static str = "sales.order";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateSalesOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSalesOrder {
    pub order_id: OrderId,
    pub quote_id: Option<QuoteId>,
    pub customer: String,
    /// Requested initial status, if the caller supplied one.
    pub status: Option<String>,
    pub notes: String,
    pub lines: Vec<NewOrderLine>,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOrder {
    pub order_id: OrderId,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AllocateOrder (inventory is reserved by the caller in the same unit of work).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateOrder {
    pub order_id: OrderId,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PickOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickOrder {
    pub order_id: OrderId,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ShipOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipOrder {
    pub order_id: OrderId,
    pub shipment_id: ShipmentId,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: InvoiceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceOrder {
    pub order_id: OrderId,
    pub invoice_id: InvoiceId,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderCommand {
    CreateSalesOrder(CreateSalesOrder),
    ConfirmOrder(ConfirmOrder),
    AllocateOrder(AllocateOrder),
    PickOrder(PickOrder),
    ShipOrder(ShipOrder),
    InvoiceOrder(InvoiceOrder),
}

impl SalesOrderCommand {
    pub fn order_id(&self) -> &OrderId {
        match self {
            SalesOrderCommand::CreateSalesOrder(c) => &c.order_id,
            SalesOrderCommand::ConfirmOrder(c) => &c.order_id,
            SalesOrderCommand::AllocateOrder(c) => &c.order_id,
            SalesOrderCommand::PickOrder(c) => &c.order_id,
            SalesOrderCommand::ShipOrder(c) => &c.order_id,
            SalesOrderCommand::InvoiceOrder(c) => &c.order_id,
        }
    }
}

/// Event: SalesOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderCreated {
    pub order_id: OrderId,
    pub quote_id: Option<QuoteId>,
    pub customer: String,
    pub notes: String,
    pub lines: Vec<SalesOrderLine>,
    pub created_by: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub order_id: OrderId,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderAllocated (`qty_allocated` per line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAllocated {
    pub order_id: OrderId,
    pub allocated: Vec<LineQty>,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderPicked (`qty_picked` per line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPicked {
    pub order_id: OrderId,
    pub picked: Vec<LineQty>,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderShipped (`qty_shipped` per line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderShipped {
    pub order_id: OrderId,
    pub shipment_id: ShipmentId,
    pub shipped: Vec<LineQty>,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderInvoiced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInvoiced {
    pub order_id: OrderId,
    pub invoice_id: InvoiceId,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderEvent {
    SalesOrderCreated(SalesOrderCreated),
    OrderConfirmed(OrderConfirmed),
    OrderAllocated(OrderAllocated),
    OrderPicked(OrderPicked),
    OrderShipped(OrderShipped),
    OrderInvoiced(OrderInvoiced),
}

impl Event for SalesOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SalesOrderEvent::SalesOrderCreated(_) => "sales.order.created",
            SalesOrderEvent::OrderConfirmed(_) => "sales.order.confirmed",
            SalesOrderEvent::OrderAllocated(_) => "sales.order.allocated",
            SalesOrderEvent::OrderPicked(_) => "sales.order.picked",
            SalesOrderEvent::OrderShipped(_) => "sales.order.shipped",
            SalesOrderEvent::OrderInvoiced(_) => "sales.order.invoiced",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SalesOrderEvent::SalesOrderCreated(e) => e.occurred_at,
            SalesOrderEvent::OrderConfirmed(e) => e.occurred_at,
            SalesOrderEvent::OrderAllocated(e) => e.occurred_at,
            SalesOrderEvent::OrderPicked(e) => e.occurred_at,
            SalesOrderEvent::OrderShipped(e) => e.occurred_at,
            SalesOrderEvent::OrderInvoiced(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SalesOrder {
    type Command = SalesOrderCommand;
    type Event = SalesOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SalesOrderEvent::SalesOrderCreated(e) => {
                self.id = e.order_id.clone();
                self.quote_id = e.quote_id.clone();
                self.customer = e.customer.clone();
                self.notes = e.notes.clone();
                self.lines = e.lines.clone();
                self.status = SalesOrderStatus::Draft;
                self.created_by = Some(e.created_by.clone());
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            SalesOrderEvent::OrderConfirmed(_) => {
                self.status = SalesOrderStatus::Confirmed;
            }
            SalesOrderEvent::OrderAllocated(e) => {
                for a in &e.allocated {
                    if let Some(line) = self.line_mut(a.line_no) {
                        line.qty_allocated = a.qty;
                    }
                }
                self.status = SalesOrderStatus::Allocated;
            }
            SalesOrderEvent::OrderPicked(e) => {
                for p in &e.picked {
                    if let Some(line) = self.line_mut(p.line_no) {
                        line.qty_picked = p.qty;
                    }
                }
                self.status = SalesOrderStatus::Picked;
            }
            SalesOrderEvent::OrderShipped(e) => {
                for s in &e.shipped {
                    if let Some(line) = self.line_mut(s.line_no) {
                        line.qty_shipped = s.qty;
                    }
                }
                self.shipment_id = Some(e.shipment_id.clone());
                self.status = SalesOrderStatus::Shipped;
            }
            SalesOrderEvent::OrderInvoiced(e) => {
                self.invoice_id = Some(e.invoice_id.clone());
                self.status = SalesOrderStatus::Invoiced;
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SalesOrderCommand::CreateSalesOrder(cmd) => self.handle_create(cmd),
            SalesOrderCommand::ConfirmOrder(cmd) => self.handle_confirm(cmd),
            SalesOrderCommand::AllocateOrder(cmd) => self.handle_allocate(cmd),
            SalesOrderCommand::PickOrder(cmd) => self.handle_pick(cmd),
            SalesOrderCommand::ShipOrder(cmd) => self.handle_ship(cmd),
            SalesOrderCommand::InvoiceOrder(cmd) => self.handle_invoice(cmd),
        }
    }
}

impl SalesOrder {
    fn line_mut(&mut self, line_no: u32) -> Option<&mut SalesOrderLine> {
        self.lines.iter_mut().find(|l| l.line_no == line_no)
    }

    fn ensure_order_id(&self, order_id: &OrderId) -> Result<(), DomainError> {
        if &self.id != order_id {
            return Err(DomainError::invalid_id(format!(
                "command order_id {order_id} does not match aggregate {}",
                self.id
            )));
        }
        Ok(())
    }

    /// Existence + guard check shared by every lifecycle transition.
    fn ensure_transition(&self, order_id: &OrderId, transition: Transition) -> Result<(), DomainError> {
        self.ensure_order_id(order_id)?;
        if !self.created {
            return Err(DomainError::not_found("sales order", order_id));
        }
        transition.check(self.status)
    }

    fn handle_create(&self, cmd: &CreateSalesOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_order_id(&cmd.order_id)?;
        if self.created {
            return Err(DomainError::conflict(format!(
                "sales order {} already exists",
                cmd.order_id
            )));
        }

        let mut errors = Vec::new();

        if cmd.customer.trim().is_empty() {
            errors.push(FieldError::new("customer", "is required"));
        }

        if let Some(raw) = &cmd.status {
            match raw.parse::<SalesOrderStatus>() {
                Ok(SalesOrderStatus::Draft) => {}
                Ok(other) => errors.push(FieldError::new(
                    "status",
                    format!("new orders start in draft, not {other}"),
                )),
                Err(DomainError::Validation(fields)) => errors.extend(fields),
                Err(other) => return Err(other),
            }
        }

        let mut lines = Vec::with_capacity(cmd.lines.len());
        for (idx, input) in cmd.lines.iter().enumerate() {
            let ipn = Ipn::new(input.ipn.as_str());
            if ipn.is_err() {
                errors.push(FieldError::new(format!("lines[{idx}].ipn"), "is required"));
            }
            if input.qty <= 0 {
                errors.push(FieldError::new(format!("lines[{idx}].qty"), "must be positive"));
            }
            if input.unit_price.is_negative() {
                errors.push(FieldError::new(
                    format!("lines[{idx}].unit_price"),
                    "must be non-negative",
                ));
            }

            if let Ok(ipn) = ipn {
                lines.push(SalesOrderLine {
                    line_no: idx as u32 + 1,
                    ipn,
                    description: input.description.clone(),
                    qty: input.qty,
                    qty_allocated: 0,
                    qty_picked: 0,
                    qty_shipped: 0,
                    unit_price: input.unit_price,
                    notes: input.notes.clone(),
                });
            }
        }

        let total = lines
            .iter()
            .try_fold(Money::ZERO, |acc, l: &SalesOrderLine| acc.checked_add(l.line_total()?));
        if total.is_none() {
            errors.push(FieldError::new("lines", "order total is out of range"));
        }

        if !errors.is_empty() {
            return Err(DomainError::Validation(errors));
        }

        Ok(vec![SalesOrderEvent::SalesOrderCreated(SalesOrderCreated {
            order_id: cmd.order_id.clone(),
            quote_id: cmd.quote_id.clone(),
            customer: cmd.customer.trim().to_string(),
            notes: cmd.notes.clone(),
            lines,
            created_by: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_transition(&cmd.order_id, Transition::Confirm)?;

        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "lines",
                "at least one line is required to confirm",
            ));
        }

        Ok(vec![SalesOrderEvent::OrderConfirmed(OrderConfirmed {
            order_id: cmd.order_id.clone(),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_allocate(&self, cmd: &AllocateOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_transition(&cmd.order_id, Transition::Allocate)?;

        let allocated = self
            .lines
            .iter()
            .map(|l| LineQty {
                line_no: l.line_no,
                qty: l.qty,
            })
            .collect();

        Ok(vec![SalesOrderEvent::OrderAllocated(OrderAllocated {
            order_id: cmd.order_id.clone(),
            allocated,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_pick(&self, cmd: &PickOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_transition(&cmd.order_id, Transition::Pick)?;

        let picked = self
            .lines
            .iter()
            .map(|l| LineQty {
                line_no: l.line_no,
                qty: l.qty_allocated,
            })
            .collect();

        Ok(vec![SalesOrderEvent::OrderPicked(OrderPicked {
            order_id: cmd.order_id.clone(),
            picked,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_ship(&self, cmd: &ShipOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_transition(&cmd.order_id, Transition::Ship)?;

        let shipped = self
            .lines
            .iter()
            .map(|l| LineQty {
                line_no: l.line_no,
                qty: l.qty_picked,
            })
            .collect();

        Ok(vec![SalesOrderEvent::OrderShipped(OrderShipped {
            order_id: cmd.order_id.clone(),
            shipment_id: cmd.shipment_id.clone(),
            shipped,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_invoice(&self, cmd: &InvoiceOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_transition(&cmd.order_id, Transition::Invoice)?;

        Ok(vec![SalesOrderEvent::OrderInvoiced(OrderInvoiced {
            order_id: cmd.order_id.clone(),
            invoice_id: cmd.invoice_id.clone(),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
