//! Infrastructure layer: event store, unit of work, order lifecycle and read models.

pub mod audit;
pub mod config;
pub mod error;
pub mod event_store;
pub mod ids;
pub mod lifecycle;
pub mod projections;
pub mod quotes;
pub mod read_model;
pub mod repository;
pub mod stock;
pub mod unit_of_work;


pub use audit::{AuditEntry, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use config::{IdFormat, LifecycleConfig};
pub use error::{LifecycleError, LifecycleResult};
pub use event_store::{
    EventStore, EventStoreError, InMemoryEventStore, PostgresEventStore, PublishingEventStore,
    StoredEvent, StreamAppend, StreamKey,
};
pub use ids::{IdGenerator, InMemorySequenceGenerator, PostgresSequenceGenerator};
pub use lifecycle::{NewSalesOrder, OrderLifecycle};
pub use quotes::{InMemoryQuoteBook, QuoteLookup};
pub use repository::OrderRepository;
pub use stock::{InventoryService, StockReceipt};
pub use unit_of_work::UnitOfWork;
