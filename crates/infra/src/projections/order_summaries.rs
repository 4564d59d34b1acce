//! Order list read model, fed from the event bus.
//!
//! Eventually consistent with the event store; the order aggregate remains
//! the source of truth for single-order reads.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use salesflow_core::{ActorId, AggregateId, AggregateRoot, DomainError, InvoiceId, Money, OrderId, QuoteId, ShipmentId};
use salesflow_events::EventEnvelope;
use salesflow_sales::{SalesOrder, SalesOrderEvent, SalesOrderStatus};

use crate::event_store::EventStore;
use crate::read_model::ReadModelStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub quote_id: Option<QuoteId>,
    pub customer: String,
    pub status: SalesOrderStatus,
    pub line_count: usize,
    pub total: Money,
    pub shipment_id: Option<ShipmentId>,
    pub invoice_id: Option<InvoiceId>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List filter. Both criteria are optional and combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<SalesOrderStatus>,
    /// Case-insensitive substring of the customer name.
    pub customer: Option<String>,
}

impl OrderFilter {
    /// Build from raw query parameters; blank values are ignored.
    pub fn parse(status: Option<&str>, customer: Option<&str>) -> Result<Self, DomainError> {
        let status = match status.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Some(SalesOrderStatus::from_str(s)?),
            None => None,
        };
        let customer = customer
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_lowercase);
        Ok(Self { status, customer })
    }

    pub fn matches(&self, summary: &OrderSummary) -> bool {
        if let Some(status) = self.status {
            if summary.status != status {
                return false;
            }
        }
        if let Some(needle) = &self.customer {
            if !summary.customer.to_lowercase().contains(needle.as_str()) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Error)]
pub enum OrderSummaryProjectionError {
    #[error("failed to deserialize sales order event: {0}")]
    Deserialize(String),
    #[error("stream mismatch: {0}")]
    StreamMismatch(String),
    #[error("non-monotonic sequence number for {order} (last={last}, found={found})")]
    NonMonotonicSequence { order: String, last: u64, found: u64 },
    #[error("projection rebuild failed: {0}")]
    Rebuild(String),
}

#[derive(Debug)]
pub struct OrderSummariesProjection<S>
where
    S: ReadModelStore<OrderId, OrderSummary>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> OrderSummariesProjection<S>
where
    S: ReadModelStore<OrderId, OrderSummary>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    fn get_cursor(&self, aggregate_id: &AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => cursors.get(aggregate_id).copied().unwrap_or(0),
            Err(_) => 0,
        }
    }

    fn update_cursor(&self, aggregate_id: &AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id.clone(), seq);
        }
    }

    fn clear_cursors(&self) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderSummary> {
        self.store.get(order_id)
    }

    /// Matching summaries, newest first.
    pub fn list(&self, filter: &OrderFilter) -> Vec<OrderSummary> {
        let mut rows: Vec<OrderSummary> = self
            .store
            .list()
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        rows
    }

    /// Apply one published envelope. Envelopes of other streams are ignored;
    /// re-delivered envelopes are skipped.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), OrderSummaryProjectionError> {
        if envelope.aggregate_type() != SalesOrder::AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(aggregate_id);
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 {
            return Err(OrderSummaryProjectionError::NonMonotonicSequence {
                order: aggregate_id.to_string(),
                last,
                found: seq,
            });
        }

        let ev: SalesOrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| OrderSummaryProjectionError::Deserialize(e.to_string()))?;

        let order_id = event_order_id(&ev);
        if order_id.as_str() != aggregate_id.as_str() {
            return Err(OrderSummaryProjectionError::StreamMismatch(format!(
                "event for {order_id} published on stream {aggregate_id}"
            )));
        }

        if let SalesOrderEvent::SalesOrderCreated(e) = &ev {
            let total = e
                .lines
                .iter()
                .try_fold(Money::ZERO, |acc, l| l.line_total().and_then(|t| acc.checked_add(t)))
                .unwrap_or(Money::ZERO);
            self.store.upsert(
                e.order_id.clone(),
                OrderSummary {
                    id: e.order_id.clone(),
                    quote_id: e.quote_id.clone(),
                    customer: e.customer.clone(),
                    status: SalesOrderStatus::Draft,
                    line_count: e.lines.len(),
                    total,
                    shipment_id: None,
                    invoice_id: None,
                    created_by: e.created_by.clone(),
                    created_at: e.occurred_at,
                    updated_at: e.occurred_at,
                },
            );
        } else if let Some(mut row) = self.store.get(order_id) {
            match &ev {
                SalesOrderEvent::SalesOrderCreated(_) => {}
                SalesOrderEvent::OrderConfirmed(_) => row.status = SalesOrderStatus::Confirmed,
                SalesOrderEvent::OrderAllocated(_) => row.status = SalesOrderStatus::Allocated,
                SalesOrderEvent::OrderPicked(_) => row.status = SalesOrderStatus::Picked,
                SalesOrderEvent::OrderShipped(e) => {
                    row.status = SalesOrderStatus::Shipped;
                    row.shipment_id = Some(e.shipment_id.clone());
                }
                SalesOrderEvent::OrderInvoiced(e) => {
                    row.status = SalesOrderStatus::Invoiced;
                    row.invoice_id = Some(e.invoice_id.clone());
                }
            }
            row.updated_at = salesflow_events::Event::occurred_at(&ev);
            self.store.upsert(order_id.clone(), row);
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), OrderSummaryProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        self.store.clear();
        self.clear_cursors();

        envs.sort_by(|a, b| {
            a.aggregate_id()
                .cmp(b.aggregate_id())
                .then(a.sequence_number().cmp(&b.sequence_number()))
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }

    /// Replay every order stream from the event store.
    pub fn rebuild_from_store<E>(&self, events: &E) -> Result<usize, OrderSummaryProjectionError>
    where
        E: EventStore + ?Sized,
    {
        let stored = events
            .load_by_type(SalesOrder::AGGREGATE_TYPE)
            .map_err(|e| OrderSummaryProjectionError::Rebuild(e.to_string()))?;
        let count = stored.len();
        self.rebuild_from_scratch(stored.iter().map(|e| e.to_envelope()))?;
        Ok(count)
    }
}

fn event_order_id(ev: &SalesOrderEvent) -> &OrderId {
    match ev {
        SalesOrderEvent::SalesOrderCreated(e) => &e.order_id,
        SalesOrderEvent::OrderConfirmed(e) => &e.order_id,
        SalesOrderEvent::OrderAllocated(e) => &e.order_id,
        SalesOrderEvent::OrderPicked(e) => &e.order_id,
        SalesOrderEvent::OrderShipped(e) => &e.order_id,
        SalesOrderEvent::OrderInvoiced(e) => &e.order_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use salesflow_sales::{OrderConfirmed, SalesOrderCreated, SalesOrderLine};
    use uuid::Uuid;

    use crate::read_model::InMemoryReadModelStore;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn envelope(order: &str, seq: u64, ev: &SalesOrderEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            AggregateId::new(order).unwrap(),
            SalesOrder::AGGREGATE_TYPE,
            seq,
            salesflow_events::Event::event_type(ev),
            salesflow_events::Event::occurred_at(ev),
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn created(order: &str, customer: &str, minutes: i64) -> SalesOrderEvent {
        SalesOrderEvent::SalesOrderCreated(SalesOrderCreated {
            order_id: OrderId::new(order).unwrap(),
            quote_id: None,
            customer: customer.to_string(),
            notes: String::new(),
            lines: vec![SalesOrderLine {
                line_no: 1,
                ipn: salesflow_core::Ipn::new("WIDGET-01").unwrap(),
                description: "Widget".to_string(),
                qty: 4,
                qty_allocated: 0,
                qty_picked: 0,
                qty_shipped: 0,
                unit_price: Money::from_cents(1_050),
                notes: String::new(),
            }],
            created_by: ActorId::new("alice").unwrap(),
            occurred_at: base_time() + Duration::minutes(minutes),
        })
    }

    fn confirmed(order: &str) -> SalesOrderEvent {
        SalesOrderEvent::OrderConfirmed(OrderConfirmed {
            order_id: OrderId::new(order).unwrap(),
            actor: ActorId::new("alice").unwrap(),
            occurred_at: base_time() + Duration::hours(1),
        })
    }

    fn projection() -> OrderSummariesProjection<InMemoryReadModelStore<OrderId, OrderSummary>> {
        OrderSummariesProjection::new(InMemoryReadModelStore::new())
    }

    #[test]
    fn summaries_follow_status_and_total() {
        let p = projection();
        p.apply_envelope(&envelope("SO-0001", 1, &created("SO-0001", "Acme", 0))).unwrap();
        p.apply_envelope(&envelope("SO-0001", 2, &confirmed("SO-0001"))).unwrap();

        let row = p.get(&OrderId::new("SO-0001").unwrap()).unwrap();
        assert_eq!(row.status, SalesOrderStatus::Confirmed);
        assert_eq!(row.total, Money::from_cents(4_200));
        assert_eq!(row.line_count, 1);
        assert!(row.updated_at > row.created_at);
    }

    #[test]
    fn redelivery_is_ignored_and_gaps_are_reported() {
        let p = projection();
        let first = envelope("SO-0001", 1, &created("SO-0001", "Acme", 0));
        p.apply_envelope(&first).unwrap();
        p.apply_envelope(&first).unwrap();

        match p.apply_envelope(&envelope("SO-0001", 3, &confirmed("SO-0001"))) {
            Err(OrderSummaryProjectionError::NonMonotonicSequence { last: 1, found: 3, .. }) => {}
            other => panic!("Expected NonMonotonicSequence, got {other:?}"),
        }
    }

    #[test]
    fn list_filters_and_sorts_newest_first() {
        let p = projection();
        p.apply_envelope(&envelope("SO-0001", 1, &created("SO-0001", "Acme Corp", 0))).unwrap();
        p.apply_envelope(&envelope("SO-0002", 1, &created("SO-0002", "Globex", 5))).unwrap();
        p.apply_envelope(&envelope("SO-0003", 1, &created("SO-0003", "ACME East", 10))).unwrap();
        p.apply_envelope(&envelope("SO-0001", 2, &confirmed("SO-0001"))).unwrap();

        let all: Vec<String> = p.list(&OrderFilter::default()).into_iter().map(|s| s.id.to_string()).collect();
        assert_eq!(all, vec!["SO-0003", "SO-0002", "SO-0001"]);

        let acme = p.list(&OrderFilter::parse(None, Some("acme")).unwrap());
        assert_eq!(acme.len(), 2);

        let confirmed_acme = p.list(&OrderFilter::parse(Some("confirmed"), Some("ACME")).unwrap());
        assert_eq!(confirmed_acme.len(), 1);
        assert_eq!(confirmed_acme[0].id.as_str(), "SO-0001");
    }

    #[test]
    fn unknown_status_filter_is_a_validation_error() {
        match OrderFilter::parse(Some("cancelled"), None) {
            Err(DomainError::Validation(fields)) => assert_eq!(fields[0].field, "status"),
            other => panic!("Expected Validation, got {other:?}"),
        }
        assert_eq!(OrderFilter::parse(Some("  "), Some("")).unwrap(), OrderFilter::default());
    }

    #[test]
    fn rebuild_replaces_existing_rows() {
        let p = projection();
        p.apply_envelope(&envelope("SO-0009", 1, &created("SO-0009", "Stale", 0))).unwrap();

        p.rebuild_from_scratch(vec![
            envelope("SO-0001", 2, &confirmed("SO-0001")),
            envelope("SO-0001", 1, &created("SO-0001", "Acme", 0)),
        ])
        .unwrap();

        assert!(p.get(&OrderId::new("SO-0009").unwrap()).is_none());
        assert_eq!(
            p.get(&OrderId::new("SO-0001").unwrap()).unwrap().status,
            SalesOrderStatus::Confirmed
        );
    }

    #[test]
    fn other_streams_are_ignored() {
        let p = projection();
        let foreign = EventEnvelope::new(
            Uuid::now_v7(),
            AggregateId::new("WIDGET-01").unwrap(),
            "inventory.record",
            1,
            "inventory.stock.received",
            base_time(),
            serde_json::json!({"anything": true}),
        );
        p.apply_envelope(&foreign).unwrap();
        assert!(p.list(&OrderFilter::default()).is_empty());
    }
}
