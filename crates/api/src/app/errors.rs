use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use salesflow_core::DomainError;
use salesflow_infra::{EventStoreError, LifecycleError};

/// Error body: `{ "error": kind, "message": text, "details": … }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Value,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: Value::Null,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        let (status, details) = match &err {
            DomainError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                json!(fields
                    .iter()
                    .map(|f| json!({ "field": f.field, "message": f.message }))
                    .collect::<Vec<_>>()),
            ),
            DomainError::InvalidId(_) => (StatusCode::BAD_REQUEST, Value::Null),
            DomainError::NotFound { entity, id } => {
                (StatusCode::NOT_FOUND, json!({ "entity": entity, "id": id }))
            }
            DomainError::InvalidTransition { required, actual } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "required": required, "actual": actual }),
            ),
            DomainError::InsufficientInventory { ipn, required, available } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "ipn": ipn, "required": required, "available": available }),
            ),
            DomainError::Conflict(_) => (StatusCode::CONFLICT, Value::Null),
        };
        Self::new(status, err.kind(), message).with_details(details)
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Domain(domain) => domain.into(),
            LifecycleError::Storage(storage) => {
                let status = match &storage {
                    EventStoreError::Concurrency(_) => StatusCode::CONFLICT,
                    EventStoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                tracing::error!(error = %storage, "storage failure");
                Self::new(status, "storage_error", storage.to_string())
            }
            LifecycleError::Deserialize(msg) => {
                tracing::error!(error = %msg, "stored event could not be decoded");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            axum::Json(json!({
                "error": self.code,
                "message": self.message,
                "details": self.details,
            })),
        )
            .into_response()
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    ApiError::new(status, code, message).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_status_codes() {
        let cases = [
            (DomainError::validation("customer", "is required"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("sales order", "SO-1"), StatusCode::NOT_FOUND),
            (DomainError::invalid_transition("confirmed", "draft"), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::insufficient("W-1", 5, 2), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::conflict("quote Q-1 already converted"), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn storage_errors_map_by_cause() {
        let busy = LifecycleError::Storage(EventStoreError::Concurrency("moved".into()));
        assert_eq!(ApiError::from(busy).status(), StatusCode::CONFLICT);

        let down = LifecycleError::Storage(EventStoreError::Unavailable("pool closed".into()));
        assert_eq!(ApiError::from(down).status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn validation_details_list_fields() {
        let err = ApiError::from(DomainError::validation("lines", "must not be empty"));
        assert_eq!(err.code, "validation_error");
        assert_eq!(err.details[0]["field"], "lines");
    }
}
