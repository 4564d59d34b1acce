use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesflow_core::{ActorId, Aggregate, AggregateRoot, DomainError, Ipn, OrderId, ShipmentId};
use salesflow_events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentType {
    Outbound,
}

/// Shipment status at creation. Carrier tracking and delivery belong to the
/// shipping service and are not modeled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentStatus {
    Packed,
}

/// One shipped order line, linked back to its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentLine {
    pub line_no: u32,
    pub ipn: Ipn,
    pub qty: i64,
    pub sales_order_id: OrderId,
    pub order_line_no: u32,
}

/// Aggregate root: Shipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shipment {
    id: ShipmentId,
    shipment_type: ShipmentType,
    status: ShipmentStatus,
    to_address: String,
    notes: String,
    lines: Vec<ShipmentLine>,
    created_by: Option<ActorId>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Shipment {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ShipmentId) -> Self {
        Self {
            id,
            shipment_type: ShipmentType::Outbound,
            status: ShipmentStatus::Packed,
            to_address: String::new(),
            notes: String::new(),
            lines: Vec::new(),
            created_by: None,
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn shipment_type(&self) -> ShipmentType {
        self.shipment_type
    }

    pub fn status(&self) -> ShipmentStatus {
        self.status
    }

    pub fn to_address(&self) -> &str {
        &self.to_address
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn lines(&self) -> &[ShipmentLine] {
        &self.lines
    }

    pub fn created_by(&self) -> Option<&ActorId> {
        self.created_by.as_ref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl AggregateRoot for Shipment {
    type Id = ShipmentId;

    const AGGREGATE_TYPE: &'static str = "documents.shipment";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateShipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateShipment {
    pub shipment_id: ShipmentId,
    pub shipment_type: ShipmentType,
    pub to_address: String,
    pub notes: String,
    pub lines: Vec<ShipmentLine>,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentCommand {
    CreateShipment(CreateShipment),
}

/// Event: ShipmentCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentCreated {
    pub shipment_id: ShipmentId,
    pub shipment_type: ShipmentType,
    pub status: ShipmentStatus,
    pub to_address: String,
    pub notes: String,
    pub lines: Vec<ShipmentLine>,
    pub created_by: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentEvent {
    ShipmentCreated(ShipmentCreated),
}

impl Event for ShipmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShipmentEvent::ShipmentCreated(_) => "documents.shipment.created",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ShipmentEvent::ShipmentCreated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Shipment {
    type Command = ShipmentCommand;
    type Event = ShipmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ShipmentEvent::ShipmentCreated(e) => {
                self.id = e.shipment_id.clone();
                self.shipment_type = e.shipment_type;
                self.status = e.status;
                self.to_address = e.to_address.clone();
                self.notes = e.notes.clone();
                self.lines = e.lines.clone();
                self.created_by = Some(e.created_by.clone());
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ShipmentCommand::CreateShipment(cmd) => self.handle_create(cmd),
        }
    }
}

impl Shipment {
    fn handle_create(&self, cmd: &CreateShipment) -> Result<Vec<ShipmentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!(
                "shipment {} already exists",
                cmd.shipment_id
            )));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("lines", "at least one line is required"));
        }
        if let Some(idx) = cmd.lines.iter().position(|l| l.qty <= 0) {
            return Err(DomainError::validation(
                format!("lines[{idx}].qty"),
                "must be positive",
            ));
        }

        Ok(vec![ShipmentEvent::ShipmentCreated(ShipmentCreated {
            shipment_id: cmd.shipment_id.clone(),
            shipment_type: cmd.shipment_type,
            status: ShipmentStatus::Packed,
            to_address: cmd.to_address.clone(),
            notes: cmd.notes.clone(),
            lines: cmd.lines.clone(),
            created_by: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesflow_events::execute;

    fn test_shipment_id() -> ShipmentId {
        ShipmentId::new("SH-0001").unwrap()
    }

    fn create_cmd(lines: Vec<ShipmentLine>) -> ShipmentCommand {
        ShipmentCommand::CreateShipment(CreateShipment {
            shipment_id: test_shipment_id(),
            shipment_type: ShipmentType::Outbound,
            to_address: "Acme".to_string(),
            notes: "Shipment for SO-0001".to_string(),
            lines,
            actor: ActorId::new("alice").unwrap(),
            occurred_at: Utc::now(),
        })
    }

    fn line(qty: i64) -> ShipmentLine {
        ShipmentLine {
            line_no: 1,
            ipn: Ipn::new("WIDGET-01").unwrap(),
            qty,
            sales_order_id: OrderId::new("SO-0001").unwrap(),
            order_line_no: 1,
        }
    }

    #[test]
    fn create_emits_packed_shipment() {
        let mut shipment = Shipment::empty(test_shipment_id());
        execute(&mut shipment, &create_cmd(vec![line(10)])).unwrap();

        assert!(shipment.exists());
        assert_eq!(shipment.status(), ShipmentStatus::Packed);
        assert_eq!(shipment.to_address(), "Acme");
        assert_eq!(shipment.lines()[0].qty, 10);
        assert_eq!(shipment.version(), 1);
    }

    #[test]
    fn shipment_is_created_once() {
        let mut shipment = Shipment::empty(test_shipment_id());
        execute(&mut shipment, &create_cmd(vec![line(10)])).unwrap();

        match shipment.handle(&create_cmd(vec![line(10)])).unwrap_err() {
            DomainError::Conflict(msg) if msg.contains("SH-0001") => {}
            other => panic!("Expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn empty_or_zero_lines_are_rejected() {
        let shipment = Shipment::empty(test_shipment_id());
        assert!(matches!(
            shipment.handle(&create_cmd(vec![])),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            shipment.handle(&create_cmd(vec![line(0)])),
            Err(DomainError::Validation(_))
        ));
    }
}
