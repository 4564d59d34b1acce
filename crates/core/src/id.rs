//! Strongly-typed identifiers used across the domain.
//!
//! Business identifiers are human-readable strings (`SO-0001`, `WIDGET-01`)
//! handed out by an external sequence generator or entered by users, so every
//! id here is a validated string newtype rather than a UUID.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

macro_rules! impl_string_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(String);

        impl $t {
            /// Build an identifier, rejecting empty or whitespace-only values.
            pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(format!("{} must not be empty", $name)));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

impl_string_id!(
    /// Identifier of an event stream (aggregate instance).
    AggregateId,
    "AggregateId"
);
impl_string_id!(
    /// Identity of the caller, used for attribution.
    ActorId,
    "ActorId"
);
impl_string_id!(
    /// Sales order identifier (`SO-0001`).
    OrderId,
    "OrderId"
);
impl_string_id!(QuoteId, "QuoteId");
impl_string_id!(
    /// Shipment identifier (`SH-0001`).
    ShipmentId,
    "ShipmentId"
);
impl_string_id!(
    /// Invoice identifier (`INV-0001`), doubling as the invoice number.
    InvoiceId,
    "InvoiceId"
);
impl_string_id!(
    /// Inventory part number: the stock-keeping unit identifier.
    Ipn,
    "Ipn"
);

macro_rules! impl_stream_id {
    ($($t:ty),*) => {
        $(
            impl From<&$t> for AggregateId {
                fn from(value: &$t) -> Self {
                    AggregateId(value.0.clone())
                }
            }
        )*
    };
}

impl_stream_id!(OrderId, QuoteId, ShipmentId, InvoiceId, Ipn);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_trimmed_and_non_empty() {
        let id = OrderId::new("  SO-0001 ").unwrap();
        assert_eq!(id.as_str(), "SO-0001");

        let err = Ipn::new("   ").unwrap_err();
        match err {
            DomainError::InvalidId(msg) if msg.contains("Ipn") => {}
            _ => panic!("Expected InvalidId for empty ipn"),
        }
    }

    #[test]
    fn stream_id_keeps_business_value() {
        let ipn: Ipn = "WIDGET-01".parse().unwrap();
        assert_eq!(AggregateId::from(&ipn).as_str(), "WIDGET-01");
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = ShipmentId::new("SH-0007").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"SH-0007\"");
    }
}
