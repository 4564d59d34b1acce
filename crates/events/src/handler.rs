/// Execute an aggregate command deterministically (no IO, no async).
///
/// Decides events with `handle`, then evolves the aggregate with `apply`, so
/// the next command run against the same instance sees the new state. Used to
/// plan several commands against one scratch copy before anything is
/// persisted.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: salesflow_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
