//! Pending lifecycle transitions.
//!
//! Every structural or lifecycle request made through the [`World`](crate::World) is
//! recorded here and applied at one fixed point per frame (the flush), never in the
//! middle of a dispatch pass.

use crate::entity::Entity;
use crate::registry::ComponentTypeId;

/// An enable/disable request, applied in request order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Toggle {
    Entity { entity: Entity, enabled: bool },
    Component { entity: Entity, id: ComponentTypeId, enabled: bool },
}

/// Everything queued since the previous flush.
#[derive(Debug, Default)]
pub(crate) struct Pending {
    pub spawned: Vec<Entity>,
    pub toggles: Vec<Toggle>,
    pub reparents: Vec<(Entity, Option<Entity>)>,
    pub removals: Vec<(Entity, ComponentTypeId)>,
    pub destroys: Vec<Entity>,
    pub starts: Vec<(Entity, ComponentTypeId)>,
}

/// Queues of pending transitions.
#[derive(Debug, Default)]
pub struct LifecycleScheduler {
    pending: Pending,
}

impl LifecycleScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn spawned(&mut self, entity: Entity) {
        self.pending.spawned.push(entity);
    }

    pub(crate) fn toggle(&mut self, toggle: Toggle) {
        self.pending.toggles.push(toggle);
    }

    pub(crate) fn reparent(&mut self, child: Entity, parent: Option<Entity>) {
        self.pending.reparents.push((child, parent));
    }

    pub(crate) fn remove(&mut self, entity: Entity, id: ComponentTypeId) {
        self.pending.removals.push((entity, id));
    }

    pub(crate) fn destroy(&mut self, entity: Entity) {
        self.pending.destroys.push(entity);
    }

    pub(crate) fn start(&mut self, entity: Entity, id: ComponentTypeId) {
        self.pending.starts.push((entity, id));
    }

    /// Take everything queued so far. Requests made while the returned batch is being
    /// applied land in a fresh batch for the next flush.
    pub(crate) fn drain(&mut self) -> Pending {
        std::mem::take(&mut self.pending)
    }

    /// Put back starts that could not run yet, ahead of any queued since the drain.
    pub(crate) fn defer_starts(&mut self, mut deferred: Vec<(Entity, ComponentTypeId)>) {
        if deferred.is_empty() {
            return;
        }
        deferred.append(&mut self.pending.starts);
        self.pending.starts = deferred;
    }

    /// Number of deferred `start` invocations waiting for a flush.
    pub fn pending_starts(&self) -> usize {
        self.pending.starts.len()
    }

    /// Number of destroy requests waiting for a flush.
    pub fn pending_destroys(&self) -> usize {
        self.pending.destroys.len()
    }

    /// Whether the next flush has nothing to do besides deferred starts.
    pub fn is_idle(&self) -> bool {
        let p = &self.pending;
        p.spawned.is_empty()
            && p.toggles.is_empty()
            && p.reparents.is_empty()
            && p.removals.is_empty()
            && p.destroys.is_empty()
    }
}
