use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use salesflow_core::ActorId;

use crate::app::errors::json_error;
use crate::context::ActorContext;

pub const ACTOR_HEADER: &str = "x-actor";

/// Reject requests without an actor identity; attach it otherwise.
pub async fn actor_middleware(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let actor = match extract_actor(req.headers()) {
        Some(actor) => actor,
        None => {
            return json_error(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                format!("missing {ACTOR_HEADER} header"),
            );
        }
    };

    req.extensions_mut().insert(ActorContext::new(actor));
    next.run(req).await
}

fn extract_actor(headers: &HeaderMap) -> Option<ActorId> {
    let raw = headers.get(ACTOR_HEADER)?.to_str().ok()?;
    ActorId::new(raw).ok()
}
