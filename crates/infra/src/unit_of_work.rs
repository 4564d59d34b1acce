//! Multi-aggregate unit of work over the event store.
//!
//! ```text
//! load A, B, C     (rehydrate, remember each stream's version)
//!   ↓
//! decide           (pure aggregate logic, outside this module)
//!   ↓
//! stage events     (per stream, expected version = version at load)
//!   ↓
//! commit           (one atomic EventStore::commit; all or nothing)
//! ```
//!
//! A stream staged without having been loaded is expected not to exist yet
//! (`ExpectedVersion::Exact(0)`), which is how fresh documents are created.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use salesflow_core::{Aggregate, AggregateId, AggregateRoot, ExpectedVersion};

use crate::error::LifecycleError;
use crate::event_store::{EventStore, EventStoreError, StoredEvent, StreamAppend, StreamKey, UncommittedEvent};

pub struct UnitOfWork<'a, S: ?Sized> {
    store: &'a S,
    loaded: HashMap<StreamKey, u64>,
    staged: Vec<StreamAppend>,
}

impl<'a, S> UnitOfWork<'a, S>
where
    S: EventStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            loaded: HashMap::new(),
            staged: Vec::new(),
        }
    }

    /// Rehydrate `aggregate` (an empty instance) from its stream.
    ///
    /// The stream's version is remembered as the expectation for any events
    /// later staged against it. Loading a stream twice keeps the first version.
    pub fn load<A>(&mut self, mut aggregate: A) -> Result<A, LifecycleError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
        AggregateId: for<'x> From<&'x A::Id>,
    {
        let key = stream_key::<A>(aggregate.id());
        let history = self.store.load_stream(&key)?;
        validate_loaded_stream(&key, &history)?;
        apply_history(&mut aggregate, &history)?;

        self.loaded.entry(key).or_insert_with(|| stream_version(&history));
        Ok(aggregate)
    }

    /// Stage decided events for one aggregate's stream.
    pub fn stage<A>(&mut self, id: &A::Id, events: &[A::Event]) -> Result<(), LifecycleError>
    where
        A: Aggregate,
        A::Event: salesflow_events::Event + Serialize,
        AggregateId: for<'x> From<&'x A::Id>,
    {
        if events.is_empty() {
            return Ok(());
        }
        let key = stream_key::<A>(id);

        let uncommitted = events
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    key.aggregate_id.clone(),
                    key.aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        match self.staged.iter_mut().find(|a| a.stream == key) {
            Some(append) => append.events.extend(uncommitted),
            None => {
                let expected = ExpectedVersion::Exact(self.loaded.get(&key).copied().unwrap_or(0));
                let mut append = StreamAppend::new(key, expected);
                append.events = uncommitted;
                self.staged.push(append);
            }
        }
        Ok(())
    }

    /// Number of streams with staged events.
    pub fn staged_streams(&self) -> usize {
        self.staged.len()
    }

    /// Persist everything staged in one atomic commit.
    pub fn commit(self) -> Result<Vec<StoredEvent>, LifecycleError> {
        if self.staged.is_empty() {
            return Ok(vec![]);
        }
        Ok(self.store.commit(self.staged)?)
    }
}

/// Read-only rehydration of a single aggregate.
pub fn load_aggregate<A, S>(store: &S, aggregate: A) -> Result<A, LifecycleError>
where
    S: EventStore + ?Sized,
    A: Aggregate,
    A::Event: DeserializeOwned,
    AggregateId: for<'x> From<&'x A::Id>,
{
    UnitOfWork::new(store).load(aggregate)
}

pub fn stream_key<A>(id: &A::Id) -> StreamKey
where
    A: AggregateRoot,
    AggregateId: for<'x> From<&'x A::Id>,
{
    StreamKey::new(A::AGGREGATE_TYPE, AggregateId::from(id))
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(key: &StreamKey, stream: &[StoredEvent]) -> Result<(), LifecycleError> {
    // A misbehaving backend must not leak another stream's events into this one.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != key.aggregate_id || e.aggregate_type != key.aggregate_type {
            return Err(EventStoreError::InvalidAppend(format!(
                "loaded stream {key} contains a foreign event at index {idx}"
            ))
            .into());
        }
        if e.sequence_number <= last {
            return Err(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in stream {key} (last={last}, found={})",
                e.sequence_number
            ))
            .into());
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), LifecycleError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone()).map_err(|e| {
            LifecycleError::Deserialize(format!("{} #{}: {e}", stored.event_type, stored.sequence_number))
        })?;
        aggregate.apply(&ev);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use salesflow_core::{ActorId, Ipn, QuoteId, OrderId};
    use salesflow_events::execute;
    use salesflow_inventory::{InventoryCommand, InventoryRecord, ReceiveStock};
    use salesflow_sales::{ConvertQuote, QuoteConversion, QuoteConversionCommand};

    use crate::event_store::InMemoryEventStore;

    fn receive(ipn: &Ipn, qty: i64) -> InventoryCommand {
        InventoryCommand::ReceiveStock(ReceiveStock {
            ipn: ipn.clone(),
            qty,
            location: None,
            reference: "PO-1".to_string(),
            notes: String::new(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn load_rehydrates_and_stage_expects_loaded_version() {
        let store = InMemoryEventStore::new();
        let ipn = Ipn::new("WIDGET-01").unwrap();

        let mut uow = UnitOfWork::new(&store);
        let mut record = uow.load(InventoryRecord::empty(ipn.clone())).unwrap();
        let events = execute(&mut record, &receive(&ipn, 10)).unwrap();
        uow.stage::<InventoryRecord>(&ipn, &events).unwrap();
        uow.commit().unwrap();

        let mut uow = UnitOfWork::new(&store);
        let mut record = uow.load(InventoryRecord::empty(ipn.clone())).unwrap();
        assert_eq!(record.qty_on_hand(), 10);
        assert_eq!(record.version(), 1);

        let events = execute(&mut record, &receive(&ipn, 5)).unwrap();
        uow.stage::<InventoryRecord>(&ipn, &events).unwrap();
        let committed = uow.commit().unwrap();
        assert_eq!(committed[0].sequence_number, 2);
    }

    #[test]
    fn concurrent_writer_invalidates_the_unit_of_work() {
        let store = InMemoryEventStore::new();
        let ipn = Ipn::new("WIDGET-01").unwrap();

        let mut slow = UnitOfWork::new(&store);
        let mut record = slow.load(InventoryRecord::empty(ipn.clone())).unwrap();
        let events = execute(&mut record, &receive(&ipn, 10)).unwrap();
        slow.stage::<InventoryRecord>(&ipn, &events).unwrap();

        let mut fast = UnitOfWork::new(&store);
        let mut other = fast.load(InventoryRecord::empty(ipn.clone())).unwrap();
        let events = execute(&mut other, &receive(&ipn, 1)).unwrap();
        fast.stage::<InventoryRecord>(&ipn, &events).unwrap();
        fast.commit().unwrap();

        let err = slow.commit().unwrap_err();
        assert!(err.is_concurrency());
    }

    #[test]
    fn unloaded_streams_must_be_new() {
        let store = InMemoryEventStore::new();
        let quote_id = QuoteId::new("Q-001").unwrap();
        let convert = |order: &str| {
            QuoteConversionCommand::ConvertQuote(ConvertQuote {
                quote_id: quote_id.clone(),
                order_id: OrderId::new(order).unwrap(),
                actor: ActorId::new("alice").unwrap(),
                occurred_at: Utc::now(),
            })
        };

        for order in ["SO-0001", "SO-0002"] {
            let mut fresh = QuoteConversion::empty(quote_id.clone());
            let events = execute(&mut fresh, &convert(order)).unwrap();
            let mut uow = UnitOfWork::new(&store);
            uow.stage::<QuoteConversion>(&quote_id, &events).unwrap();
            let result = uow.commit();
            if order == "SO-0001" {
                result.unwrap();
            } else {
                assert!(result.unwrap_err().is_concurrency());
            }
        }

        let conversion = load_aggregate(&store, QuoteConversion::empty(quote_id.clone())).unwrap();
        assert_eq!(conversion.order_id().unwrap().as_str(), "SO-0001");
    }

    #[test]
    fn staging_one_stream_twice_merges_events() {
        let store = InMemoryEventStore::new();
        let ipn = Ipn::new("WIDGET-01").unwrap();

        let mut uow = UnitOfWork::new(&store);
        let mut record = uow.load(InventoryRecord::empty(ipn.clone())).unwrap();
        let first = execute(&mut record, &receive(&ipn, 1)).unwrap();
        let second = execute(&mut record, &receive(&ipn, 2)).unwrap();
        uow.stage::<InventoryRecord>(&ipn, &first).unwrap();
        uow.stage::<InventoryRecord>(&ipn, &second).unwrap();
        assert_eq!(uow.staged_streams(), 1);

        let committed = uow.commit().unwrap();
        assert_eq!(committed.len(), 2);
        assert_eq!(committed[1].sequence_number, 2);
    }
}
