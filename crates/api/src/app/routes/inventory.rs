use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};

use salesflow_core::Ipn;
use salesflow_inventory::InventoryTransaction;

use crate::app::dto::{self, InventoryResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/:ipn", get(get_inventory))
        .route("/:ipn/transactions", get(list_transactions))
        .route("/:ipn/receive", post(receive_stock))
        .route("/:ipn/release", post(release_stock))
}

pub async fn get_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Path(ipn): Path<String>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let ipn = Ipn::new(ipn)?;
    let record = services.run(move |s| s.inventory().get(&ipn)).await?;
    Ok(Json(InventoryResponse::from(&record)))
}

/// Transaction log, newest first.
pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(ipn): Path<String>,
) -> Result<Json<Vec<InventoryTransaction>>, ApiError> {
    let ipn = Ipn::new(ipn)?;
    let history = services.run(move |s| s.inventory().history(&ipn)).await?;
    Ok(Json(history))
}

pub async fn receive_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(ipn): Path<String>,
    Json(body): Json<dto::ReceiveStockRequest>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let ipn = Ipn::new(ipn)?;
    let actor = actor.actor().clone();
    let record = services
        .run(move |s| s.inventory().receive(&ipn, body.into(), &actor))
        .await?;
    Ok(Json(InventoryResponse::from(&record)))
}

pub async fn release_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(ipn): Path<String>,
    Json(body): Json<dto::ReleaseStockRequest>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let ipn = Ipn::new(ipn)?;
    let actor = actor.actor().clone();
    let record = services
        .run(move |s| s.inventory().release(&ipn, body.qty, &body.reference, &actor))
        .await?;
    Ok(Json(InventoryResponse::from(&record)))
}
