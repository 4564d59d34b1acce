//! `salesflow-core` - domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, FieldError};
pub use id::{ActorId, AggregateId, InvoiceId, Ipn, OrderId, QuoteId, ShipmentId};
pub use value_object::{Money, ValueObject};
