//! Infrastructure wiring: event store, id sequences, lifecycle controller and
//! the order-summary projection fed from the event bus.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use salesflow_core::OrderId;
use salesflow_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use salesflow_infra::projections::{OrderSummariesProjection, OrderSummary};
use salesflow_infra::read_model::InMemoryReadModelStore;
use salesflow_infra::{
    AuditSink, EventStore, IdGenerator, InMemoryEventStore, InMemoryQuoteBook,
    InMemorySequenceGenerator, InventoryService, LifecycleConfig, LifecycleError, OrderLifecycle,
    PostgresEventStore, PostgresSequenceGenerator, PublishingEventStore, TracingAuditSink,
};

use crate::app::errors::ApiError;
use crate::config::ApiConfig;

pub type SharedStore = Arc<dyn EventStore>;
pub type EnvelopeBus = InMemoryEventBus<EventEnvelope<serde_json::Value>>;
pub type OrderSummaries = OrderSummariesProjection<InMemoryReadModelStore<OrderId, OrderSummary>>;

pub struct AppServices {
    lifecycle: OrderLifecycle<SharedStore>,
    inventory: InventoryService<SharedStore>,
    summaries: Arc<OrderSummaries>,
    quotes: Arc<InMemoryQuoteBook>,
}

impl AppServices {
    pub fn lifecycle(&self) -> &OrderLifecycle<SharedStore> {
        &self.lifecycle
    }

    pub fn inventory(&self) -> &InventoryService<SharedStore> {
        &self.inventory
    }

    pub fn summaries(&self) -> &OrderSummaries {
        &self.summaries
    }

    /// Accepted quotes available for conversion.
    pub fn quotes(&self) -> &Arc<InMemoryQuoteBook> {
        &self.quotes
    }

    /// Run a controller call on the blocking pool.
    ///
    /// The controller and the Postgres store are synchronous; they must not run
    /// on an async worker.
    pub async fn run<T, F>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&AppServices) -> Result<T, LifecycleError> + Send + 'static,
        T: Send + 'static,
    {
        let services = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&services))
            .await
            .map_err(|e| ApiError::internal(format!("worker task failed: {e}")))?
            .map_err(ApiError::from)
    }
}

pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    if config.use_persistent_stores {
        tracing::info!("using persistent stores (Postgres)");
        build_persistent_services(config).await
    } else {
        tracing::info!("using in-memory stores");
        Ok(build_in_memory_services(&config.lifecycle))
    }
}

pub fn build_in_memory_services(config: &LifecycleConfig) -> AppServices {
    let store: SharedStore = Arc::new(InMemoryEventStore::new());
    assemble(store, Arc::new(InMemorySequenceGenerator::new()), config)
}

async fn build_persistent_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    let store = PostgresEventStore::new(pool.clone());
    store.ensure_schema().await.context("failed to create event store schema")?;

    let ids = PostgresSequenceGenerator::new(pool);
    Ok(assemble(Arc::new(store), Arc::new(ids), &config.lifecycle))
}

fn assemble(raw: SharedStore, ids: Arc<dyn IdGenerator>, config: &LifecycleConfig) -> AppServices {
    let bus: Arc<EnvelopeBus> = Arc::new(InMemoryEventBus::new());
    let summaries = Arc::new(OrderSummariesProjection::new(InMemoryReadModelStore::new()));

    // Subscribe before the first commit so no envelope is missed.
    spawn_projection_worker(bus.subscribe(), summaries.clone(), raw.clone());
    match summaries.rebuild_from_store(&raw) {
        Ok(n) => tracing::info!(events = n, "order summaries loaded"),
        Err(err) => tracing::error!(error = %err, "order summary rebuild failed"),
    }

    let store: SharedStore = Arc::new(PublishingEventStore::new(raw, bus));
    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let quotes = Arc::new(InMemoryQuoteBook::new());

    AppServices {
        lifecycle: OrderLifecycle::new(store.clone(), ids, quotes.clone(), audit.clone(), config.clone()),
        inventory: InventoryService::new(store, audit, config.max_commit_attempts),
        summaries,
        quotes,
    }
}

/// Background subscriber: bus -> order summaries.
///
/// A sequence gap means an envelope was lost; the projection is then rebuilt
/// from the store, which stays the source of truth. The worker stops when the
/// bus is dropped.
fn spawn_projection_worker(
    sub: Subscription<EventEnvelope<serde_json::Value>>,
    summaries: Arc<OrderSummaries>,
    store: SharedStore,
) {
    // Postgres loads block on the runtime that owns the pool.
    let runtime = tokio::runtime::Handle::try_current().ok();

    let spawned = std::thread::Builder::new()
        .name("order-summaries".to_string())
        .spawn(move || {
            let _guard = runtime.as_ref().map(|h| h.enter());
            while let Ok(envelope) = sub.recv() {
                if let Err(err) = summaries.apply_envelope(&envelope) {
                    tracing::warn!(error = %err, "order summaries out of step, rebuilding");
                    if let Err(err) = summaries.rebuild_from_store(&store) {
                        tracing::error!(error = %err, "order summary rebuild failed");
                    }
                }
            }
            tracing::debug!("event bus closed, projection worker stopping");
        });

    if let Err(err) = spawned {
        tracing::error!(error = %err, "failed to start projection worker");
    }
}
