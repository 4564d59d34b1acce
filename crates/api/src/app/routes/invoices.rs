use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::get,
    Json, Router,
};

use salesflow_core::InvoiceId;

use crate::app::dto::InvoiceResponse;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/:id", get(get_invoice))
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let invoice_id = InvoiceId::new(id)?;
    let invoice = services.run(move |s| s.lifecycle().get_invoice(&invoice_id)).await?;
    Ok(Json(InvoiceResponse::from(&invoice)))
}
