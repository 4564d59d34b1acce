//! Domain error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One offending input field of a rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl core::fmt::Display for FieldError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

/// Domain-level error.
///
/// Every variant is a deterministic business failure: callers inspect the kind
/// and fix their input or give up. Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input, reported per offending field.
    #[error("validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    /// Unknown order, stock item, quote or document.
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    /// Guard failed: the entity is not in the status the operation requires.
    #[error("invalid transition: requires status {required}, current status is {actual}")]
    InvalidTransition { required: String, actual: String },

    /// Not enough available-to-promise (or reserved) stock.
    #[error("insufficient inventory for {ipn}: required {required}, available {available}")]
    InsufficientInventory {
        ipn: String,
        required: i64,
        available: i64,
    },

    /// Uniqueness violation (e.g. quote already converted).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An identifier was invalid (e.g. empty).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(required: impl ToString, actual: impl ToString) -> Self {
        Self::InvalidTransition {
            required: required.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn insufficient(ipn: impl ToString, required: i64, available: i64) -> Self {
        Self::InsufficientInventory {
            ipn: ipn.to_string(),
            required,
            available,
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Stable machine-readable kind, used by outer layers for error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Validation(_) | DomainError::InvalidId(_) => "validation_error",
            DomainError::NotFound { .. } => "not_found",
            DomainError::InvalidTransition { .. } => "invalid_transition",
            DomainError::InsufficientInventory { .. } => "insufficient_inventory",
            DomainError::Conflict(_) => "conflict",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_field() {
        let err = DomainError::Validation(vec![
            FieldError::new("customer", "is required"),
            FieldError::new("lines[0].qty", "must be positive"),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: customer is required; lines[0].qty must be positive"
        );
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn insufficient_inventory_reports_required_and_available() {
        let err = DomainError::insufficient("WIDGET-01", 10, 5);
        assert_eq!(
            err.to_string(),
            "insufficient inventory for WIDGET-01: required 10, available 5"
        );
        assert_eq!(err.kind(), "insufficient_inventory");
    }
}
