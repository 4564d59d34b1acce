//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, id sequences, controller, projection worker
//! - `routes/`: handlers, one file per resource
//! - `dto.rs`: request/response DTOs and JSON mapping
//! - `errors.rs`: error kinds to status codes

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router from process configuration (used by `main.rs`).
pub async fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(build_router(services))
}

/// Router over already-wired services.
pub fn build_router(services: Arc<AppServices>) -> Router {
    let protected = routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(middleware::actor_middleware))
            .layer(Extension(services)),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
