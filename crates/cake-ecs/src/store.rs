use crate::component::Component;
use crate::entity::Entity;
use crate::lifecycle::LifecycleState;
use crate::registry::ComponentTypeId;

/// Stable index of a component inside its type's store. Valid until released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(pub(crate) u32);

/// One attached component plus its bookkeeping.
pub(crate) struct StoredComponent {
    pub owner: Entity,
    /// Own enable flag, independent of the owner's state.
    pub enabled: bool,
    pub started: bool,
    pub pending_removal: bool,
    /// `None` while the component is lent out to one of its own callbacks.
    component: Option<Box<dyn Component>>,
}

impl StoredComponent {
    pub fn state(&self) -> LifecycleState {
        if self.pending_removal {
            LifecycleState::PendingDestroy
        } else if !self.started {
            LifecycleState::Constructing
        } else if !self.enabled {
            LifecycleState::Disabled
        } else {
            LifecycleState::Active
        }
    }

    /// Started, enabled and not being removed.
    pub fn is_live(&self) -> bool {
        self.started && self.enabled && !self.pending_removal
    }
}

/// Storage for every instance of one component type.
///
/// Slots are stable for the lifetime of the component and recycled after release.
/// Lookup by owner goes through a sparse array indexed by entity index.
pub struct ComponentStore {
    type_id: ComponentTypeId,
    /// Maps entity index → slot. `None` means the entity has no component.
    sparse: Vec<Option<Slot>>,
    slots: Vec<Option<StoredComponent>>,
    free: Vec<u32>,
    len: usize,
}

impl ComponentStore {
    pub fn new(type_id: ComponentTypeId) -> Self {
        Self {
            type_id,
            sparse: Vec::new(),
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    /// Store `component` for `owner`.
    ///
    /// # Panics
    ///
    /// Panics if `owner` already has a component in this store.
    pub fn allocate(&mut self, owner: Entity, component: Box<dyn Component>) -> Slot {
        assert!(
            self.slot_of(owner).is_none(),
            "entity {owner} already has a component of type {:?}",
            self.type_id
        );
        let stored = StoredComponent {
            owner,
            enabled: true,
            started: false,
            pending_removal: false,
            component: Some(component),
        };
        let slot = if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(stored);
            Slot(index)
        } else {
            self.slots.push(Some(stored));
            Slot(self.slots.len() as u32 - 1)
        };

        let idx = owner.index as usize;
        if idx >= self.sparse.len() {
            self.sparse.resize(idx + 1, None);
        }
        self.sparse[idx] = Some(slot);
        self.len += 1;
        slot
    }

    /// Reclaim a slot, returning the component it held. Any outstanding slot handle
    /// becomes invalid.
    pub fn release(&mut self, slot: Slot) -> Option<Box<dyn Component>> {
        let stored = self.slots.get_mut(slot.0 as usize)?.take()?;
        let idx = stored.owner.index as usize;
        if self.sparse.get(idx).copied().flatten() == Some(slot) {
            self.sparse[idx] = None;
        }
        self.free.push(slot.0);
        self.len -= 1;
        stored.component
    }

    /// The slot held by `owner`, if any. Stale handles never match.
    pub fn slot_of(&self, owner: Entity) -> Option<Slot> {
        let slot = self.sparse.get(owner.index as usize).copied().flatten()?;
        match self.entry(slot) {
            Some(stored) if stored.owner == owner => Some(slot),
            _ => None,
        }
    }

    pub fn get(&self, owner: Entity) -> Option<&dyn Component> {
        let slot = self.slot_of(owner)?;
        self.entry(slot)?.component.as_deref()
    }

    pub fn get_mut(&mut self, owner: Entity) -> Option<&mut (dyn Component + 'static)> {
        let slot = self.slot_of(owner)?;
        self.entry_mut(slot)?.component.as_deref_mut()
    }

    pub(crate) fn entry(&self, slot: Slot) -> Option<&StoredComponent> {
        self.slots.get(slot.0 as usize)?.as_ref()
    }

    pub(crate) fn entry_mut(&mut self, slot: Slot) -> Option<&mut StoredComponent> {
        self.slots.get_mut(slot.0 as usize)?.as_mut()
    }

    /// Lend the component out of its slot for the duration of a callback.
    pub(crate) fn take(&mut self, slot: Slot) -> Option<Box<dyn Component>> {
        self.entry_mut(slot)?.component.take()
    }

    /// Put a lent-out component back.
    pub(crate) fn restore(&mut self, slot: Slot, component: Box<dyn Component>) {
        if let Some(stored) = self.entry_mut(slot) {
            stored.component = Some(component);
        }
    }

    /// Number of components stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);
    impl Component for Counter {}

    fn counter(store: &ComponentStore, owner: Entity) -> Option<u32> {
        store
            .get(owner)
            .and_then(|c| c.downcast_ref::<Counter>())
            .map(|c| c.0)
    }

    #[test]
    fn allocate_and_get() {
        let mut store = ComponentStore::new(ComponentTypeId(0));
        let owner = Entity::from_raw(5, 0);
        store.allocate(owner, Box::new(Counter(42)));
        assert_eq!(counter(&store, owner), Some(42));
        assert_eq!(counter(&store, Entity::from_raw(0, 0)), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    #[should_panic(expected = "already has a component")]
    fn duplicate_allocation_panics() {
        let mut store = ComponentStore::new(ComponentTypeId(0));
        let owner = Entity::from_raw(0, 0);
        store.allocate(owner, Box::new(Counter(1)));
        store.allocate(owner, Box::new(Counter(2)));
    }

    #[test]
    fn release_recycles_slot() {
        let mut store = ComponentStore::new(ComponentTypeId(0));
        let a = Entity::from_raw(0, 0);
        let b = Entity::from_raw(1, 0);
        let slot_a = store.allocate(a, Box::new(Counter(1)));
        let slot_b = store.allocate(b, Box::new(Counter(2)));

        assert!(store.release(slot_a).is_some());
        assert!(store.release(slot_a).is_none());
        assert_eq!(counter(&store, a), None);
        assert_eq!(counter(&store, b), Some(2));
        assert_eq!(store.slot_of(b), Some(slot_b));

        let c = Entity::from_raw(2, 0);
        assert_eq!(store.allocate(c, Box::new(Counter(3))), slot_a);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn stale_owner_does_not_match() {
        let mut store = ComponentStore::new(ComponentTypeId(0));
        let old = Entity::from_raw(3, 0);
        store.allocate(old, Box::new(Counter(7)));
        let recycled = Entity::from_raw(3, 1);
        assert_eq!(store.slot_of(recycled), None);
        assert_eq!(counter(&store, recycled), None);
    }

    #[test]
    fn lend_and_restore() {
        let mut store = ComponentStore::new(ComponentTypeId(0));
        let owner = Entity::from_raw(0, 0);
        let slot = store.allocate(owner, Box::new(Counter(1)));

        let lent = store.take(slot).unwrap();
        assert!(store.get(owner).is_none());
        assert_eq!(store.slot_of(owner), Some(slot));
        store.restore(slot, lent);
        assert_eq!(counter(&store, owner), Some(1));
    }

    #[test]
    fn derived_state() {
        let mut store = ComponentStore::new(ComponentTypeId(0));
        let slot = store.allocate(Entity::from_raw(0, 0), Box::new(Counter(0)));
        assert_eq!(store.entry(slot).unwrap().state(), LifecycleState::Constructing);

        let entry = store.entry_mut(slot).unwrap();
        entry.started = true;
        assert!(entry.is_live());
        entry.enabled = false;
        assert_eq!(entry.state(), LifecycleState::Disabled);
        entry.pending_removal = true;
        assert_eq!(entry.state(), LifecycleState::PendingDestroy);
    }
}
