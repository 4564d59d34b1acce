//! Quote contract and the one-order-per-quote rule.
//!
//! Quotes themselves are owned by another service; this crate only needs what
//! conversion reads from them. `QuoteConversion` is a tiny aggregate whose
//! single event marks a quote as converted, so "at most one order per quote"
//! is enforced by the same optimistic stream check as everything else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesflow_core::{ActorId, Aggregate, AggregateRoot, DomainError, Money, OrderId, QuoteId};
use salesflow_events::Event;

use crate::order::NewOrderLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Expired => "expired",
        }
    }
}

impl core::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub ipn: String,
    pub description: String,
    pub qty: i64,
    pub unit_price: Money,
    pub notes: String,
}

/// Quote as returned by the quote lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub customer: String,
    pub status: QuoteStatus,
    pub notes: String,
    pub lines: Vec<QuoteLine>,
}

impl Quote {
    /// Only accepted quotes become orders.
    pub fn ensure_accepted(&self) -> Result<(), DomainError> {
        if self.status != QuoteStatus::Accepted {
            return Err(DomainError::validation(
                "quote.status",
                format!("quote {} must be accepted, current status is {}", self.id, self.status),
            ));
        }
        Ok(())
    }

    pub fn order_lines(&self) -> Vec<NewOrderLine> {
        self.lines
            .iter()
            .map(|l| NewOrderLine {
                ipn: l.ipn.clone(),
                description: l.description.clone(),
                qty: l.qty,
                unit_price: l.unit_price,
                notes: l.notes.clone(),
            })
            .collect()
    }
}

/// Aggregate root: QuoteConversion (stream keyed by quote id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteConversion {
    quote_id: QuoteId,
    order_id: Option<OrderId>,
    version: u64,
}

impl QuoteConversion {
    pub fn empty(quote_id: QuoteId) -> Self {
        Self {
            quote_id,
            order_id: None,
            version: 0,
        }
    }

    /// Order the quote was converted into, if any.
    pub fn order_id(&self) -> Option<&OrderId> {
        self.order_id.as_ref()
    }
}

impl AggregateRoot for QuoteConversion {
    type Id = QuoteId;

    const AGGREGATE_TYPE: &'static str = "sales.quote_conversion";

    fn id(&self) -> &Self::Id {
        &self.quote_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ConvertQuote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertQuote {
    pub quote_id: QuoteId,
    pub order_id: OrderId,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteConversionCommand {
    ConvertQuote(ConvertQuote),
}

/// Event: QuoteConverted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteConverted {
    pub quote_id: QuoteId,
    pub order_id: OrderId,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteConversionEvent {
    QuoteConverted(QuoteConverted),
}

impl Event for QuoteConversionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            QuoteConversionEvent::QuoteConverted(_) => "sales.quote.converted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            QuoteConversionEvent::QuoteConverted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for QuoteConversion {
    type Command = QuoteConversionCommand;
    type Event = QuoteConversionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            QuoteConversionEvent::QuoteConverted(e) => {
                self.quote_id = e.quote_id.clone();
                self.order_id = Some(e.order_id.clone());
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            QuoteConversionCommand::ConvertQuote(cmd) => {
                if let Some(existing) = &self.order_id {
                    return Err(DomainError::conflict(format!(
                        "quote {} already converted to order {existing}",
                        cmd.quote_id
                    )));
                }

                Ok(vec![QuoteConversionEvent::QuoteConverted(QuoteConverted {
                    quote_id: cmd.quote_id.clone(),
                    order_id: cmd.order_id.clone(),
                    actor: cmd.actor.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesflow_events::execute;

    fn test_quote(status: QuoteStatus) -> Quote {
        Quote {
            id: QuoteId::new("Q-001").unwrap(),
            customer: "Acme".to_string(),
            status,
            notes: "rush".to_string(),
            lines: vec![QuoteLine {
                ipn: "WIDGET-01".to_string(),
                description: "Widget".to_string(),
                qty: 10,
                unit_price: Money::from_cents(2_500),
                notes: String::new(),
            }],
        }
    }

    fn convert(order: &str) -> QuoteConversionCommand {
        QuoteConversionCommand::ConvertQuote(ConvertQuote {
            quote_id: QuoteId::new("Q-001").unwrap(),
            order_id: OrderId::new(order).unwrap(),
            actor: ActorId::new("alice").unwrap(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn only_accepted_quotes_convert() {
        assert!(test_quote(QuoteStatus::Accepted).ensure_accepted().is_ok());

        for status in [QuoteStatus::Draft, QuoteStatus::Sent, QuoteStatus::Rejected, QuoteStatus::Expired] {
            match test_quote(status).ensure_accepted().unwrap_err() {
                DomainError::Validation(fields) => assert_eq!(fields[0].field, "quote.status"),
                other => panic!("Expected Validation, got {other:?}"),
            }
        }
    }

    #[test]
    fn quote_lines_copy_into_order_lines() {
        let lines = test_quote(QuoteStatus::Accepted).order_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].ipn, "WIDGET-01");
        assert_eq!(lines[0].qty, 10);
        assert_eq!(lines[0].unit_price, Money::from_cents(2_500));
    }

    #[test]
    fn second_conversion_conflicts_and_names_first_order() {
        let mut conversion = QuoteConversion::empty(QuoteId::new("Q-001").unwrap());
        execute(&mut conversion, &convert("SO-0001")).unwrap();
        assert_eq!(conversion.order_id().unwrap().as_str(), "SO-0001");

        match conversion.handle(&convert("SO-0002")).unwrap_err() {
            DomainError::Conflict(msg) => {
                assert_eq!(msg, "quote Q-001 already converted to order SO-0001")
            }
            other => panic!("Expected Conflict, got {other:?}"),
        }
    }
}
