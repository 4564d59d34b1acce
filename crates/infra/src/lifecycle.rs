//! Order Lifecycle Controller.
//!
//! Drives a sales order through draft → confirmed → allocated → picked →
//! shipped → invoiced. Every transition:
//!
//! 1. loads the order (and any inventory records / document streams it touches)
//! 2. checks existence, then the status guard
//! 3. allocates document ids, plans ledger movements and derives documents
//! 4. commits every staged stream in one atomic batch
//! 5. audits, after the commit
//!
//! Any failure before step 4 leaves the store untouched. A commit that loses an
//! optimistic race is re-run from step 1, up to `max_commit_attempts` times.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use salesflow_core::{ActorId, AggregateRoot, DomainError, InvoiceId, Ipn, OrderId, QuoteId, ShipmentId};
use salesflow_documents::{DocumentFactory, Invoice, Shipment};
use salesflow_events::execute;
use salesflow_inventory::{InventoryRecord, LedgerBatch};
use salesflow_sales::{
    AllocateOrder, ConfirmOrder, ConvertQuote, CreateSalesOrder, InvoiceOrder, NewOrderLine,
    PickOrder, QuoteConversion, QuoteConversionCommand, SalesOrder, SalesOrderCommand,
    ShipOrder, Transition,
};

use crate::audit::{AuditEntry, AuditSink};
use crate::config::{IdFormat, LifecycleConfig};
use crate::error::LifecycleResult;
use crate::event_store::EventStore;
use crate::ids::IdGenerator;
use crate::quotes::QuoteLookup;
use crate::repository::OrderRepository;
use crate::unit_of_work::UnitOfWork;

/// Input for a manually entered order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSalesOrder {
    pub customer: String,
    pub notes: String,
    /// Requested initial status; only `draft` is accepted.
    pub status: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

/// Outcome of one attempt, carried to the audit step.
struct Committed {
    order: SalesOrder,
    action: String,
    detail: String,
}

pub struct OrderLifecycle<S> {
    store: S,
    ids: Arc<dyn IdGenerator>,
    quotes: Arc<dyn QuoteLookup>,
    audit: Arc<dyn AuditSink>,
    documents: DocumentFactory,
    config: LifecycleConfig,
}

impl<S> OrderLifecycle<S>
where
    S: EventStore,
{
    pub fn new(
        store: S,
        ids: Arc<dyn IdGenerator>,
        quotes: Arc<dyn QuoteLookup>,
        audit: Arc<dyn AuditSink>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            ids,
            quotes,
            audit,
            documents: DocumentFactory::new(config.invoice_terms_days),
            config,
        }
    }

    pub fn repository(&self) -> OrderRepository<'_, S> {
        OrderRepository::new(&self.store)
    }

    /// Current state of an order, rebuilt from its stream.
    pub fn get_order(&self, order_id: &OrderId) -> LifecycleResult<SalesOrder> {
        self.repository().get(order_id)
    }

    pub fn get_shipment(&self, shipment_id: &ShipmentId) -> LifecycleResult<Shipment> {
        self.repository().shipment(shipment_id)
    }

    pub fn get_invoice(&self, invoice_id: &InvoiceId) -> LifecycleResult<Invoice> {
        self.repository().invoice(invoice_id)
    }

    #[instrument(skip(self, input), fields(actor = %actor, lines = input.lines.len()), err)]
    pub fn create_order(&self, input: NewSalesOrder, actor: &ActorId) -> LifecycleResult<SalesOrder> {
        self.with_retry("create", || {
            let now = Utc::now();
            let order_id = OrderId::new(self.next_id(&self.config.order_ids)?)?;

            let mut uow = UnitOfWork::new(&self.store);
            let mut order = uow.load(SalesOrder::empty(order_id.clone()))?;
            let events = execute(
                &mut order,
                &SalesOrderCommand::CreateSalesOrder(CreateSalesOrder {
                    order_id: order_id.clone(),
                    quote_id: None,
                    customer: input.customer.clone(),
                    status: input.status.clone(),
                    notes: input.notes.clone(),
                    lines: input.lines.clone(),
                    actor: actor.clone(),
                    occurred_at: now,
                }),
            )?;
            uow.stage::<SalesOrder>(&order_id, &events)?;
            uow.commit()?;

            Ok(Committed {
                detail: format!("Created sales order {order_id} for {}", order.customer()),
                action: "create".to_string(),
                order,
            })
        })
        .map(|done| self.finish(done, actor))
    }

    /// Create a draft order copying an accepted quote. A quote converts at most once.
    #[instrument(skip(self), fields(quote_id = %quote_id, actor = %actor), err)]
    pub fn create_order_from_quote(&self, quote_id: &QuoteId, actor: &ActorId) -> LifecycleResult<SalesOrder> {
        self.with_retry("convert_quote", || {
            let now = Utc::now();
            let quote = self
                .quotes
                .find(quote_id)?
                .ok_or_else(|| DomainError::not_found("quote", quote_id))?;
            quote.ensure_accepted()?;

            let mut uow = UnitOfWork::new(&self.store);
            let conversion = uow.load(QuoteConversion::empty(quote_id.clone()))?;
            if let Some(existing) = conversion.order_id() {
                return Err(DomainError::conflict(format!(
                    "quote {quote_id} already converted to order {existing}"
                ))
                .into());
            }

            let order_id = OrderId::new(self.next_id(&self.config.order_ids)?)?;
            let mut order = uow.load(SalesOrder::empty(order_id.clone()))?;
            let order_events = execute(
                &mut order,
                &SalesOrderCommand::CreateSalesOrder(CreateSalesOrder {
                    order_id: order_id.clone(),
                    quote_id: Some(quote_id.clone()),
                    customer: quote.customer.clone(),
                    status: None,
                    notes: quote.notes.clone(),
                    lines: quote.order_lines(),
                    actor: actor.clone(),
                    occurred_at: now,
                }),
            )?;

            let mut conversion = conversion;
            let conversion_events = execute(
                &mut conversion,
                &QuoteConversionCommand::ConvertQuote(ConvertQuote {
                    quote_id: quote_id.clone(),
                    order_id: order_id.clone(),
                    actor: actor.clone(),
                    occurred_at: now,
                }),
            )?;

            uow.stage::<SalesOrder>(&order_id, &order_events)?;
            uow.stage::<QuoteConversion>(quote_id, &conversion_events)?;
            uow.commit()?;

            Ok(Committed {
                detail: format!("Converted quote {quote_id} to {order_id}"),
                action: "convert".to_string(),
                order,
            })
        })
        .map(|done| self.finish(done, actor))
    }

    #[instrument(skip(self), fields(order_id = %order_id, actor = %actor), err)]
    pub fn confirm(&self, order_id: &OrderId, actor: &ActorId) -> LifecycleResult<SalesOrder> {
        self.transition(Transition::Confirm, order_id, actor)
    }

    /// Reserve every line's full quantity, all lines or none.
    #[instrument(skip(self), fields(order_id = %order_id, actor = %actor), err)]
    pub fn allocate(&self, order_id: &OrderId, actor: &ActorId) -> LifecycleResult<SalesOrder> {
        self.transition(Transition::Allocate, order_id, actor)
    }

    #[instrument(skip(self), fields(order_id = %order_id, actor = %actor), err)]
    pub fn pick(&self, order_id: &OrderId, actor: &ActorId) -> LifecycleResult<SalesOrder> {
        self.transition(Transition::Pick, order_id, actor)
    }

    /// Issue picked stock and create the outbound shipment.
    #[instrument(skip(self), fields(order_id = %order_id, actor = %actor), err)]
    pub fn ship(&self, order_id: &OrderId, actor: &ActorId) -> LifecycleResult<SalesOrder> {
        self.transition(Transition::Ship, order_id, actor)
    }

    /// Create the draft invoice.
    #[instrument(skip(self), fields(order_id = %order_id, actor = %actor), err)]
    pub fn invoice(&self, order_id: &OrderId, actor: &ActorId) -> LifecycleResult<SalesOrder> {
        self.transition(Transition::Invoice, order_id, actor)
    }

    fn transition(&self, transition: Transition, order_id: &OrderId, actor: &ActorId) -> LifecycleResult<SalesOrder> {
        let done = self.with_retry(transition.name(), || self.attempt_transition(transition, order_id, actor))?;
        tracing::info!(
            order_id = %order_id,
            from = %transition.from(),
            to = %transition.to(),
            "order transitioned"
        );
        Ok(self.finish(done, actor))
    }

    fn attempt_transition(
        &self,
        transition: Transition,
        order_id: &OrderId,
        actor: &ActorId,
    ) -> LifecycleResult<Committed> {
        let now = Utc::now();
        let mut uow = UnitOfWork::new(&self.store);

        let mut order = uow.load(SalesOrder::empty(order_id.clone()))?;
        if !order.exists() {
            return Err(DomainError::not_found("sales order", order_id).into());
        }
        let from = order.status();
        transition.check(from)?;

        let mut detail = format!("Transitioned {order_id} from {from} to {}", transition.to());
        let command = match transition {
            Transition::Confirm => SalesOrderCommand::ConfirmOrder(ConfirmOrder {
                order_id: order_id.clone(),
                actor: actor.clone(),
                occurred_at: now,
            }),
            Transition::Allocate => {
                let mut batch = self.track_inventory(&mut uow, &order)?;
                let reference = ledger_reference(order_id);
                for line in order.lines() {
                    batch.reserve(
                        &line.ipn,
                        line.qty,
                        &reference,
                        format!("Reserved {} for {order_id}", line.qty),
                        now,
                    )?;
                }
                stage_ledger(&mut uow, batch)?;
                SalesOrderCommand::AllocateOrder(AllocateOrder {
                    order_id: order_id.clone(),
                    actor: actor.clone(),
                    occurred_at: now,
                })
            }
            Transition::Pick => SalesOrderCommand::PickOrder(PickOrder {
                order_id: order_id.clone(),
                actor: actor.clone(),
                occurred_at: now,
            }),
            Transition::Ship => {
                let shipment_id = ShipmentId::new(self.next_id(&self.config.shipment_ids)?)?;

                let mut batch = self.track_inventory(&mut uow, &order)?;
                let reference = ledger_reference(order_id);
                for line in order.lines() {
                    batch.issue(
                        &line.ipn,
                        line.qty_picked,
                        &reference,
                        format!("Shipped {} for {order_id}", line.qty_picked),
                        now,
                    )?;
                }
                stage_ledger(&mut uow, batch)?;

                let mut shipment = uow.load(Shipment::empty(shipment_id.clone()))?;
                let cmd = self.documents.shipment_for(&order, shipment_id.clone(), actor, now);
                let events = execute(&mut shipment, &cmd)?;
                uow.stage::<Shipment>(&shipment_id, &events)?;

                detail = format!("Shipped {order_id} via shipment {shipment_id}");
                SalesOrderCommand::ShipOrder(ShipOrder {
                    order_id: order_id.clone(),
                    shipment_id,
                    actor: actor.clone(),
                    occurred_at: now,
                })
            }
            Transition::Invoice => {
                let invoice_id = InvoiceId::new(self.next_id(&self.config.invoice_ids)?)?;

                let mut invoice = uow.load(Invoice::empty(invoice_id.clone()))?;
                let cmd = self.documents.invoice_for(&order, invoice_id.clone(), actor, now)?;
                let events = execute(&mut invoice, &cmd)?;
                uow.stage::<Invoice>(&invoice_id, &events)?;

                detail = format!("Created invoice {invoice_id} for {order_id} ({})", invoice.total());
                SalesOrderCommand::InvoiceOrder(InvoiceOrder {
                    order_id: order_id.clone(),
                    invoice_id,
                    actor: actor.clone(),
                    occurred_at: now,
                })
            }
        };

        let events = execute(&mut order, &command)?;
        uow.stage::<SalesOrder>(order_id, &events)?;
        uow.commit()?;

        Ok(Committed {
            order,
            action: transition.to().to_string(),
            detail,
        })
    }

    /// Load every distinct inventory record the order's lines touch.
    fn track_inventory(&self, uow: &mut UnitOfWork<'_, S>, order: &SalesOrder) -> LifecycleResult<LedgerBatch> {
        let ipns: BTreeSet<&Ipn> = order.lines().iter().map(|l| &l.ipn).collect();
        let mut batch = LedgerBatch::new();
        for ipn in ipns {
            batch.track(uow.load(InventoryRecord::empty(ipn.clone()))?);
        }
        Ok(batch)
    }

    fn next_id(&self, format: &IdFormat) -> LifecycleResult<String> {
        Ok(self.ids.next_id(&format.prefix, format.width)?)
    }

    /// Run `attempt` until it succeeds, fails for a business reason, or the
    /// optimistic retry budget is spent.
    fn with_retry<T>(&self, operation: &str, mut attempt: impl FnMut() -> LifecycleResult<T>) -> LifecycleResult<T> {
        let max = self.config.max_commit_attempts.max(1);
        let mut n = 1;
        loop {
            match attempt() {
                Err(err) if err.is_concurrency() && n < max => {
                    tracing::warn!(%operation, attempt = n, max_attempts = max, error = %err, "commit conflict, retrying");
                    n += 1;
                }
                Err(err) if err.is_concurrency() => {
                    tracing::warn!(%operation, attempts = n, "commit conflict, giving up");
                    return Err(err);
                }
                other => return other,
            }
        }
    }

    fn finish(&self, done: Committed, actor: &ActorId) -> SalesOrder {
        self.audit.record(AuditEntry {
            actor: actor.clone(),
            action: done.action,
            entity_type: "sales_order".to_string(),
            entity_id: done.order.id().to_string(),
            detail: done.detail,
        });
        done.order
    }
}

fn ledger_reference(order_id: &OrderId) -> String {
    format!("SO:{order_id}")
}

fn stage_ledger<S>(uow: &mut UnitOfWork<'_, S>, batch: LedgerBatch) -> LifecycleResult<()>
where
    S: EventStore + ?Sized,
{
    for (ipn, events) in batch.into_pending() {
        uow.stage::<InventoryRecord>(&ipn, &events)?;
    }
    Ok(())
}
