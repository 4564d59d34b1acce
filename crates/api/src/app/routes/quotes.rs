use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use salesflow_core::QuoteId;

use crate::app::dto::SalesOrderResponse;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new().route("/:id/convert", post(convert_quote))
}

/// Create a draft sales order from an accepted quote.
pub async fn convert_quote(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let quote_id = QuoteId::new(id)?;
    let actor = actor.actor().clone();
    let order = services
        .run(move |s| s.lifecycle().create_order_from_quote(&quote_id, &actor))
        .await?;
    Ok((StatusCode::CREATED, Json(SalesOrderResponse::from(&order))))
}
