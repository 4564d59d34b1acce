use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::get,
    Json, Router,
};

use salesflow_core::ShipmentId;

use crate::app::dto::ShipmentResponse;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/:id", get(get_shipment))
}

pub async fn get_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Json<ShipmentResponse>, ApiError> {
    let shipment_id = ShipmentId::new(id)?;
    let shipment = services.run(move |s| s.lifecycle().get_shipment(&shipment_id)).await?;
    Ok(Json(ShipmentResponse::from(&shipment)))
}
