use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use salesflow_core::OrderId;
use salesflow_infra::projections::OrderFilter;
use salesflow_sales::Transition;

use crate::app::dto::{self, OrderSummaryResponse, SalesOrderResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_sales_order).get(list_sales_orders))
        .route("/:id", get(get_sales_order))
        .route("/:id/confirm", post(confirm_sales_order))
        .route("/:id/allocate", post(allocate_sales_order))
        .route("/:id/pick", post(pick_sales_order))
        .route("/:id/ship", post(ship_sales_order))
        .route("/:id/invoice", post(invoice_sales_order))
}

pub async fn create_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreateSalesOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = body.into_new_order()?;
    let actor = actor.actor().clone();
    let order = services.run(move |s| s.lifecycle().create_order(input, &actor)).await?;
    Ok((StatusCode::CREATED, Json(SalesOrderResponse::from(&order))))
}

/// Served from the order-summary projection; may trail recent writes.
pub async fn list_sales_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListOrdersQuery>,
) -> Result<Json<Vec<OrderSummaryResponse>>, ApiError> {
    let filter = OrderFilter::parse(query.status.as_deref(), query.customer.as_deref())?;
    let rows = services.summaries().list(&filter);
    Ok(Json(rows.into_iter().map(OrderSummaryResponse::from).collect()))
}

pub async fn get_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Json<SalesOrderResponse>, ApiError> {
    let order_id = OrderId::new(id)?;
    let order = services.run(move |s| s.lifecycle().get_order(&order_id)).await?;
    Ok(Json(SalesOrderResponse::from(&order)))
}

pub async fn confirm_sales_order(
    services: Extension<Arc<AppServices>>,
    actor: Extension<ActorContext>,
    id: Path<String>,
) -> Result<Json<SalesOrderResponse>, ApiError> {
    transition(services, actor, id, Transition::Confirm).await
}

pub async fn allocate_sales_order(
    services: Extension<Arc<AppServices>>,
    actor: Extension<ActorContext>,
    id: Path<String>,
) -> Result<Json<SalesOrderResponse>, ApiError> {
    transition(services, actor, id, Transition::Allocate).await
}

pub async fn pick_sales_order(
    services: Extension<Arc<AppServices>>,
    actor: Extension<ActorContext>,
    id: Path<String>,
) -> Result<Json<SalesOrderResponse>, ApiError> {
    transition(services, actor, id, Transition::Pick).await
}

pub async fn ship_sales_order(
    services: Extension<Arc<AppServices>>,
    actor: Extension<ActorContext>,
    id: Path<String>,
) -> Result<Json<SalesOrderResponse>, ApiError> {
    transition(services, actor, id, Transition::Ship).await
}

pub async fn invoice_sales_order(
    services: Extension<Arc<AppServices>>,
    actor: Extension<ActorContext>,
    id: Path<String>,
) -> Result<Json<SalesOrderResponse>, ApiError> {
    transition(services, actor, id, Transition::Invoice).await
}

async fn transition(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    transition: Transition,
) -> Result<Json<SalesOrderResponse>, ApiError> {
    let order_id = OrderId::new(id)?;
    let actor = actor.actor().clone();
    let order = services
        .run(move |s| {
            let lifecycle = s.lifecycle();
            match transition {
                Transition::Confirm => lifecycle.confirm(&order_id, &actor),
                Transition::Allocate => lifecycle.allocate(&order_id, &actor),
                Transition::Pick => lifecycle.pick(&order_id, &actor),
                Transition::Ship => lifecycle.ship(&order_id, &actor),
                Transition::Invoice => lifecycle.invoice(&order_id, &actor),
            }
        })
        .await?;
    Ok(Json(SalesOrderResponse::from(&order)))
}
