use salesflow_core::ActorId;

/// Acting user for a request, taken from the `x-actor` header.
///
/// Present on every route except `/health`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor: ActorId,
}

impl ActorContext {
    pub fn new(actor: ActorId) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }
}
