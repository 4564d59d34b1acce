//! Order status set and its transition table.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use salesflow_core::DomainError;

/// Sales order lifecycle, in strict forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesOrderStatus {
    Draft,
    Confirmed,
    Allocated,
    Picked,
    Shipped,
    Invoiced,
}

impl SalesOrderStatus {
    pub const ALL: [SalesOrderStatus; 6] = [
        SalesOrderStatus::Draft,
        SalesOrderStatus::Confirmed,
        SalesOrderStatus::Allocated,
        SalesOrderStatus::Picked,
        SalesOrderStatus::Shipped,
        SalesOrderStatus::Invoiced,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SalesOrderStatus::Draft => "draft",
            SalesOrderStatus::Confirmed => "confirmed",
            SalesOrderStatus::Allocated => "allocated",
            SalesOrderStatus::Picked => "picked",
            SalesOrderStatus::Shipped => "shipped",
            SalesOrderStatus::Invoiced => "invoiced",
        }
    }
}

impl core::fmt::Display for SalesOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SalesOrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SalesOrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| {
                let allowed = SalesOrderStatus::ALL.map(SalesOrderStatus::as_str).join(", ");
                DomainError::validation("status", format!("must be one of: {allowed}"))
            })
    }
}

/// Guarded lifecycle operations. Each one moves an order from exactly one
/// status to the next; there is no skipping and no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Confirm,
    Allocate,
    Pick,
    Ship,
    Invoice,
}

impl Transition {
    pub const ALL: [Transition; 5] = [
        Transition::Confirm,
        Transition::Allocate,
        Transition::Pick,
        Transition::Ship,
        Transition::Invoice,
    ];

    /// Status the order must be in.
    pub fn from(self) -> SalesOrderStatus {
        match self {
            Transition::Confirm => SalesOrderStatus::Draft,
            Transition::Allocate => SalesOrderStatus::Confirmed,
            Transition::Pick => SalesOrderStatus::Allocated,
            Transition::Ship => SalesOrderStatus::Picked,
            Transition::Invoice => SalesOrderStatus::Shipped,
        }
    }

    /// Status the order ends up in.
    pub fn to(self) -> SalesOrderStatus {
        match self {
            Transition::Confirm => SalesOrderStatus::Confirmed,
            Transition::Allocate => SalesOrderStatus::Allocated,
            Transition::Pick => SalesOrderStatus::Picked,
            Transition::Ship => SalesOrderStatus::Shipped,
            Transition::Invoice => SalesOrderStatus::Invoiced,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Transition::Confirm => "confirm",
            Transition::Allocate => "allocate",
            Transition::Pick => "pick",
            Transition::Ship => "ship",
            Transition::Invoice => "invoice",
        }
    }

    /// Guard: fails with `InvalidTransition` unless `current` is the required status.
    pub fn check(self, current: SalesOrderStatus) -> Result<(), DomainError> {
        if current != self.from() {
            return Err(DomainError::invalid_transition(self.from(), current));
        }
        Ok(())
    }
}

impl core::fmt::Display for Transition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_chain_draft_to_invoiced() {
        let mut status = SalesOrderStatus::Draft;
        for t in Transition::ALL {
            t.check(status).unwrap();
            status = t.to();
        }
        assert_eq!(status, SalesOrderStatus::Invoiced);
    }

    #[test]
    fn guard_reports_required_and_actual() {
        let err = Transition::Allocate.check(SalesOrderStatus::Draft).unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("confirmed", "draft"));
    }

    #[test]
    fn every_status_except_the_source_fails_the_guard() {
        for t in Transition::ALL {
            for s in SalesOrderStatus::ALL {
                assert_eq!(t.check(s).is_ok(), s == t.from(), "{t} from {s}");
            }
        }
    }

    #[test]
    fn parse_rejects_unknown_status() {
        assert_eq!("shipped".parse::<SalesOrderStatus>().unwrap(), SalesOrderStatus::Shipped);
        match "cancelled".parse::<SalesOrderStatus>().unwrap_err() {
            DomainError::Validation(fields) => {
                assert_eq!(fields[0].field, "status");
                assert!(fields[0].message.contains("draft, confirmed"));
            }
            other => panic!("Expected Validation, got {other:?}"),
        }
    }
}
