//! Projection implementations (read model builders).
//!
//! Projections consume published envelopes and build query-optimized read
//! models. They are:
//! - **Rebuildable**: can be reconstructed from the event store
//! - **Idempotent**: safe for at-least-once delivery

pub mod order_summaries;

pub use order_summaries::{OrderFilter, OrderSummariesProjection, OrderSummary, OrderSummaryProjectionError};
