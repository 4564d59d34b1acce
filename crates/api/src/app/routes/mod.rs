use axum::Router;

pub mod inventory;
pub mod invoices;
pub mod quotes;
pub mod sales;
pub mod shipments;
pub mod system;

/// Router for every endpoint that requires an actor.
pub fn router() -> Router {
    Router::new()
        .nest("/sales-orders", sales::router())
        .nest("/quotes", quotes::router())
        .nest("/inventory", inventory::router())
        .nest("/shipments", shipments::router())
        .nest("/invoices", invoices::router())
}
