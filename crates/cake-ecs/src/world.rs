use std::any::type_name;

use cake_core::GameTime;
use tracing::{debug, trace, warn};

use crate::component::{Component, Phase};
use crate::context::Context;
use crate::entity::{Entity, EntityRecord, EntityTable};
use crate::error::EcsError;
use crate::game::GameHandle;
use crate::lifecycle::LifecycleState;
use crate::registry::{ComponentTypeId, ComponentTypeRegistry};
use crate::scheduler::{LifecycleScheduler, Toggle};
use crate::store::{ComponentStore, Slot, StoredComponent};

/// The central container. Owns every entity, every component store and the queue of
/// pending lifecycle transitions.
///
/// Requests (`destroy`, `enable`, `disable`, `remove_component`, `set_parent`) are
/// recorded immediately and applied by [`flush`](World::flush). Attaching a component
/// allocates its storage right away but defers `start` to the next flush.
pub struct World {
    pub(crate) entities: EntityTable,
    pub(crate) registry: ComponentTypeRegistry,
    pub(crate) stores: Vec<ComponentStore>,
    pub(crate) scheduler: LifecycleScheduler,
    /// Set while a flush or dispatch pass is running.
    in_pass: bool,
}

impl World {
    pub fn new() -> Self {
        Self {
            entities: EntityTable::new(),
            registry: ComponentTypeRegistry::new(),
            stores: Vec::new(),
            scheduler: LifecycleScheduler::new(),
            in_pass: false,
        }
    }

    // ---- Registration ----

    /// Register a component type, returning its key. Idempotent.
    pub fn register<T: Component>(&mut self) -> ComponentTypeId {
        let id = self.registry.register::<T>();
        self.ensure_store(id);
        id
    }

    /// Register a component type together with its `Default` prototype, enabling
    /// [`add_component_by_id`](World::add_component_by_id).
    pub fn register_default<T: Component + Default>(&mut self) -> ComponentTypeId {
        let id = self.registry.register_default::<T>();
        self.ensure_store(id);
        id
    }

    pub fn registry(&self) -> &ComponentTypeRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &LifecycleScheduler {
        &self.scheduler
    }

    /// The store holding every instance of the type registered under `id`.
    pub fn store(&self, id: ComponentTypeId) -> Option<&ComponentStore> {
        self.stores.get(id.index())
    }

    fn ensure_store(&mut self, id: ComponentTypeId) {
        while self.stores.len() <= id.index() {
            let next = ComponentTypeId(self.stores.len() as u32);
            self.stores.push(ComponentStore::new(next));
        }
    }

    // ---- Entity management ----

    /// Create a root entity.
    pub fn spawn(&mut self) -> Entity {
        let entity = self.entities.allocate(None);
        self.scheduler.spawned(entity);
        trace!(entity = %entity, "spawned");
        entity
    }

    /// Create an entity as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is destroyed or pending destruction.
    pub fn spawn_child(&mut self, parent: Entity) -> Entity {
        let state = self.record(parent, "spawn_child").state;
        assert!(
            !state.is_dying(),
            "cannot spawn a child under entity {parent}, which is pending destruction"
        );
        let entity = self.entities.allocate(Some(parent));
        self.scheduler.spawned(entity);
        trace!(entity = %entity, parent = %parent, "spawned child");
        entity
    }

    /// Check whether an entity is alive (not yet reclaimed).
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Lifecycle state of an entity; `Destroyed` for stale handles.
    pub fn state(&self, entity: Entity) -> LifecycleState {
        self.entities
            .get(entity)
            .map_or(LifecycleState::Destroyed, |r| r.state)
    }

    /// Number of alive entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Request that `entity` be enabled at the next flush.
    pub fn enable(&mut self, entity: Entity) {
        self.record(entity, "enable");
        self.scheduler.toggle(Toggle::Entity {
            entity,
            enabled: true,
        });
    }

    /// Request that `entity` be disabled at the next flush. Its subtree stops
    /// receiving frame callbacks; descendants keep their own state.
    pub fn disable(&mut self, entity: Entity) {
        self.record(entity, "disable");
        self.scheduler.toggle(Toggle::Entity {
            entity,
            enabled: false,
        });
    }

    /// Mark `entity` and its whole subtree pending-destroy now, and reclaim them at the
    /// next flush. Destroying an entity that is already pending is a no-op.
    pub fn destroy(&mut self, entity: Entity) {
        if self.record(entity, "destroy").state.is_dying() {
            return;
        }
        let doomed: Vec<Entity> = self.subtree(entity).collect();
        for e in &doomed {
            if let Some(record) = self.entities.get_mut(*e) {
                record.state = LifecycleState::PendingDestroy;
            }
        }
        self.scheduler.destroy(entity);
        debug!(entity = %entity, subtree = doomed.len(), "destroy requested");
    }

    /// Request destruction of every root (and therefore every entity).
    pub fn destroy_all(&mut self) {
        let roots = self.entities.roots().to_vec();
        for root in roots {
            self.destroy(root);
        }
    }

    // ---- Component management ----

    /// Attach a default-constructed `T` to `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is destroyed or pending destruction, or already has a `T`
    /// (including one whose removal has not been flushed yet).
    pub fn add_component<T: Component + Default>(&mut self, entity: Entity) -> &mut T {
        self.add_component_with(entity, T::default())
    }

    /// Attach `component` to `entity`, returning it for further configuration.
    ///
    /// # Panics
    ///
    /// Same conditions as [`add_component`](World::add_component).
    pub fn add_component_with<T: Component>(&mut self, entity: Entity, component: T) -> &mut T {
        self.assert_can_attach(entity, self.registry.get::<T>(), type_name::<T>());
        let id = self.register::<T>();
        self.attach(entity, id, Box::new(component))
            .downcast_mut::<T>()
            .expect("component type mismatch")
    }

    /// Attach a fresh instance of the type registered under `id`, built from its
    /// prototype.
    ///
    /// # Panics
    ///
    /// Same conditions as [`add_component`](World::add_component), and also if the
    /// type has no prototype.
    pub fn add_component_by_id(
        &mut self,
        entity: Entity,
        id: ComponentTypeId,
    ) -> &mut (dyn Component + 'static) {
        self.assert_can_attach(entity, Some(id), self.registry.name(id));
        let component = self.registry.construct(id);
        self.attach(entity, id, component)
    }

    fn assert_can_attach(&self, entity: Entity, id: Option<ComponentTypeId>, name: &str) {
        let state = self.record(entity, "add_component").state;
        assert!(
            !state.is_dying(),
            "cannot attach `{name}` to entity {entity}, which is pending destruction"
        );
        let Some(store) = id.and_then(|id| self.stores.get(id.index())) else {
            return;
        };
        let Some(entry) = store.slot_of(entity).and_then(|slot| store.entry(slot)) else {
            return;
        };
        assert!(
            !entry.pending_removal,
            "entity {entity} keeps its `{name}` component until the removal is flushed"
        );
        panic!("entity {entity} already has a `{name}` component");
    }

    fn attach(
        &mut self,
        entity: Entity,
        id: ComponentTypeId,
        component: Box<dyn Component>,
    ) -> &mut (dyn Component + 'static) {
        self.ensure_store(id);
        let slot = self.stores[id.index()].allocate(entity, component);
        self.record_mut(entity, "add_component").components.push((id, slot));
        self.scheduler.start(entity, id);
        trace!(entity = %entity, component = self.registry.name(id), "attached");
        self.stores[id.index()]
            .get_mut(entity)
            .expect("component was just attached")
    }

    /// The `T` attached to `entity`, if any.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        let id = self.registry.id_of::<T>();
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.stores[id.index()].get(entity)?.downcast_ref::<T>()
    }

    /// Mutable access to the `T` attached to `entity`, if any.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered.
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let id = self.registry.id_of::<T>();
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.stores[id.index()].get_mut(entity)?.downcast_mut::<T>()
    }

    /// Whether `entity` has a `T` attached.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered.
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        let id = self.registry.id_of::<T>();
        self.entities
            .get(entity)
            .is_some_and(|r| r.slot_of(id).is_some())
    }

    /// Lifecycle state of the `T` attached to `entity`.
    pub fn component_state<T: Component>(&self, entity: Entity) -> Option<LifecycleState> {
        let id = self.registry.id_of::<T>();
        let slot = self.entities.get(entity)?.slot_of(id)?;
        self.stores[id.index()].entry(slot).map(StoredComponent::state)
    }

    /// Number of `T` instances currently stored.
    pub fn component_count<T: Component>(&self) -> usize {
        self.registry
            .get::<T>()
            .map_or(0, |id| self.stores[id.index()].len())
    }

    /// Detach the `T` from `entity` at the next flush, running its teardown first.
    /// Returns `false` if no `T` is attached.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> bool {
        self.record(entity, "remove_component");
        let id = self.registry.id_of::<T>();
        let Some(slot) = self.stores[id.index()].slot_of(entity) else {
            return false;
        };
        if let Some(entry) = self.stores[id.index()].entry_mut(slot) {
            if !entry.pending_removal {
                entry.pending_removal = true;
                self.scheduler.remove(entity, id);
            }
        }
        true
    }

    /// Request that the `T` on `entity` be enabled or disabled at the next flush.
    /// Returns `false` if no `T` is attached.
    pub fn set_component_enabled<T: Component>(&mut self, entity: Entity, enabled: bool) -> bool {
        self.record(entity, "set_component_enabled");
        let id = self.registry.id_of::<T>();
        if self.stores[id.index()].slot_of(entity).is_none() {
            return false;
        }
        self.scheduler.toggle(Toggle::Component {
            entity,
            id,
            enabled,
        });
        true
    }

    // ---- Frame ----

    /// Apply every queued transition: entity promotion, enable/disable requests in
    /// request order, reparenting, component removals, destruction (deepest descendant
    /// first), then deferred `start` calls in attachment order.
    ///
    /// A failing callback aborts the flush; the remaining batch is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called from inside a component callback.
    pub fn flush(&mut self, time: &GameTime, game: &GameHandle) -> Result<(), EcsError> {
        self.begin_pass("flush");
        let result = self.apply_pending(time, game);
        self.in_pass = false;
        result
    }

    fn apply_pending(&mut self, time: &GameTime, game: &GameHandle) -> Result<(), EcsError> {
        let pending = self.scheduler.drain();

        for entity in pending.spawned {
            if let Some(record) = self.entities.get_mut(entity) {
                if record.state == LifecycleState::Constructing {
                    record.state = LifecycleState::Active;
                }
            }
        }

        for toggle in pending.toggles {
            self.apply_toggle(toggle, time, game)?;
        }

        for (child, parent) in pending.reparents {
            self.apply_reparent(child, parent);
        }

        for (entity, id) in pending.removals {
            self.apply_removal(entity, id, time, game)?;
        }

        for root in pending.destroys {
            self.apply_destroy(root, time, game)?;
        }

        self.run_starts(pending.starts, time, game)
    }

    /// Invoke `phase` on every live component of every active entity, parents before
    /// children. Requests made by callbacks wait for the next flush.
    ///
    /// # Panics
    ///
    /// Panics if called from inside a component callback.
    pub fn dispatch(
        &mut self,
        phase: Phase,
        time: &GameTime,
        game: &GameHandle,
    ) -> Result<(), EcsError> {
        self.begin_pass("dispatch");
        let result = self.dispatch_active(phase, time, game);
        self.in_pass = false;
        result
    }

    fn dispatch_active(
        &mut self,
        phase: Phase,
        time: &GameTime,
        game: &GameHandle,
    ) -> Result<(), EcsError> {
        for entity in self.active_preorder() {
            let components = match self.entities.get(entity) {
                Some(record) if record.state.is_active() => record.components.clone(),
                _ => continue,
            };
            for (id, slot) in components {
                // An earlier callback may have destroyed this entity.
                if !self.state(entity).is_active() {
                    break;
                }
                let live = self.stores[id.index()]
                    .entry(slot)
                    .is_some_and(StoredComponent::is_live);
                if live {
                    self.invoke(entity, id, slot, phase, time, game)?;
                }
            }
        }
        Ok(())
    }

    /// One frame without the embedding application: flush, then `update`,
    /// `physics_update` and `graphics_update` across the whole active set.
    pub fn run_frame(&mut self, time: &GameTime, game: &GameHandle) -> Result<(), EcsError> {
        self.flush(time, game)?;
        for phase in Phase::FRAME {
            self.dispatch(phase, time, game)?;
        }
        Ok(())
    }

    /// Send `on_game_end` to every attached component, in hierarchy order.
    pub fn notify_game_end(
        &mut self,
        time: &GameTime,
        game: &GameHandle,
    ) -> Result<(), EcsError> {
        self.begin_pass("notify_game_end");
        let result = self.broadcast_game_end(time, game);
        self.in_pass = false;
        result
    }

    fn broadcast_game_end(&mut self, time: &GameTime, game: &GameHandle) -> Result<(), EcsError> {
        let roots = self.entities.roots().to_vec();
        let everything: Vec<Entity> = roots
            .into_iter()
            .flat_map(|r| self.subtree(r))
            .collect();
        for entity in everything {
            let Some(record) = self.entities.get(entity) else {
                continue;
            };
            for (id, slot) in record.components.clone() {
                self.invoke(entity, id, slot, Phase::GameEnd, time, game)?;
            }
        }
        Ok(())
    }

    fn begin_pass(&mut self, op: &str) {
        assert!(!self.in_pass, "{op} called from inside a component callback");
        self.in_pass = true;
    }

    // ---- Transition application ----

    fn apply_toggle(
        &mut self,
        toggle: Toggle,
        time: &GameTime,
        game: &GameHandle,
    ) -> Result<(), EcsError> {
        match toggle {
            Toggle::Entity { entity, enabled } => {
                let Some(record) = self.entities.get(entity) else {
                    warn!(entity = %entity, "dropping enable/disable request for destroyed entity");
                    return Ok(());
                };
                match (record.state, enabled) {
                    (LifecycleState::Disabled, true) => {
                        self.set_state(entity, LifecycleState::Active);
                        self.notify_live(entity, Phase::Enable, time, game)?;
                        debug!(entity = %entity, "enabled");
                    }
                    (LifecycleState::Active, false) => {
                        self.notify_live(entity, Phase::Disable, time, game)?;
                        self.set_state(entity, LifecycleState::Disabled);
                        debug!(entity = %entity, "disabled");
                    }
                    _ => {}
                }
            }
            Toggle::Component { entity, id, enabled } => {
                let Some(record) = self.entities.get(entity) else {
                    warn!(entity = %entity, "dropping component toggle for destroyed entity");
                    return Ok(());
                };
                let owner_active = record.state.is_active();
                let Some(slot) = record.slot_of(id) else {
                    return Ok(());
                };
                let Some(entry) = self.stores[id.index()].entry(slot) else {
                    return Ok(());
                };
                if entry.pending_removal || entry.enabled == enabled {
                    return Ok(());
                }
                let notify = entry.started && owner_active;
                if enabled {
                    self.set_component_flag(id, slot, true);
                    if notify {
                        self.invoke(entity, id, slot, Phase::Enable, time, game)?;
                    }
                } else {
                    if notify {
                        self.invoke(entity, id, slot, Phase::Disable, time, game)?;
                    }
                    self.set_component_flag(id, slot, false);
                }
            }
        }
        Ok(())
    }

    fn apply_reparent(&mut self, child: Entity, parent: Option<Entity>) {
        let child_ok = !self.state(child).is_dying();
        let parent_ok = parent.map_or(true, |p| {
            !self.state(p).is_dying() && !self.entities.is_ancestor_or_self(child, p)
        });
        if !child_ok || !parent_ok {
            warn!(
                child = %child,
                parent = ?parent,
                "dropping reparent request that is no longer valid"
            );
            return;
        }
        self.entities.reparent(child, parent);
        debug!(child = %child, parent = ?parent, "reparented");
    }

    fn apply_removal(
        &mut self,
        entity: Entity,
        id: ComponentTypeId,
        time: &GameTime,
        game: &GameHandle,
    ) -> Result<(), EcsError> {
        // Dying entities tear all of their components down in apply_destroy.
        let slot = match self.entities.get(entity) {
            Some(record) if !record.state.is_dying() => record.slot_of(id),
            _ => None,
        };
        let Some(slot) = slot else {
            return Ok(());
        };
        self.invoke(entity, id, slot, Phase::Destroy, time, game)?;
        self.stores[id.index()].release(slot);
        if let Some(record) = self.entities.get_mut(entity) {
            record.components.retain(|(key, _)| *key != id);
        }
        debug!(entity = %entity, component = self.registry.name(id), "component removed");
        Ok(())
    }

    fn apply_destroy(
        &mut self,
        root: Entity,
        time: &GameTime,
        game: &GameHandle,
    ) -> Result<(), EcsError> {
        if !self.entities.is_alive(root) {
            return Ok(());
        }
        let order = self.post_order(root);
        for &entity in &order {
            self.set_state(entity, LifecycleState::PendingDestroy);
        }
        for entity in order {
            self.teardown(entity, time, game)?;
        }
        Ok(())
    }

    fn teardown(
        &mut self,
        entity: Entity,
        time: &GameTime,
        game: &GameHandle,
    ) -> Result<(), EcsError> {
        let components = self.components_of(entity);
        for (id, slot) in components {
            self.invoke(entity, id, slot, Phase::Destroy, time, game)?;
        }

        let Some(record) = self.entities.deallocate(entity) else {
            return Ok(());
        };
        debug_assert!(record.children.is_empty(), "entity {entity} reclaimed before its children");
        for (id, slot) in record.components {
            self.stores[id.index()].release(slot);
        }
        debug!(entity = %entity, "destroyed");
        Ok(())
    }

    fn run_starts(
        &mut self,
        starts: Vec<(Entity, ComponentTypeId)>,
        time: &GameTime,
        game: &GameHandle,
    ) -> Result<(), EcsError> {
        let mut deferred = Vec::new();
        for (entity, id) in starts {
            let slot = match self.entities.get(entity) {
                Some(record) if !record.state.is_dying() => record.slot_of(id),
                _ => None,
            };
            let Some(slot) = slot else {
                continue;
            };
            let Some(entry) = self.stores[id.index()].entry(slot) else {
                continue;
            };
            if entry.started || entry.pending_removal {
                continue;
            }
            if !entry.enabled || !self.is_active_in_hierarchy(entity) {
                deferred.push((entity, id));
                continue;
            }
            self.invoke(entity, id, slot, Phase::Start, time, game)?;
            if let Some(entry) = self.stores[id.index()].entry_mut(slot) {
                entry.started = true;
            }
        }
        self.scheduler.defer_starts(deferred);
        Ok(())
    }

    /// Notify every live component of `entity`.
    fn notify_live(
        &mut self,
        entity: Entity,
        phase: Phase,
        time: &GameTime,
        game: &GameHandle,
    ) -> Result<(), EcsError> {
        let components = self.components_of(entity);
        for (id, slot) in components {
            let live = self.stores[id.index()]
                .entry(slot)
                .is_some_and(StoredComponent::is_live);
            if live {
                self.invoke(entity, id, slot, phase, time, game)?;
            }
        }
        Ok(())
    }

    /// Lend the component out of its slot, run one callback with a context over the
    /// whole world, and put it back whatever the outcome.
    fn invoke(
        &mut self,
        entity: Entity,
        id: ComponentTypeId,
        slot: Slot,
        phase: Phase,
        time: &GameTime,
        game: &GameHandle,
    ) -> Result<(), EcsError> {
        let Some(mut component) = self.stores[id.index()].take(slot) else {
            return Ok(());
        };
        let result = {
            let mut ctx = Context::new(self, entity, time, game);
            phase.call(&mut *component, &mut ctx)
        };
        self.stores[id.index()].restore(slot, component);
        result.map_err(|source| EcsError::Callback {
            phase,
            entity,
            component: self.registry.name(id),
            source,
        })
    }

    fn components_of(&self, entity: Entity) -> Vec<(ComponentTypeId, Slot)> {
        self.entities
            .get(entity)
            .map(|r| r.components.clone())
            .unwrap_or_default()
    }

    fn set_state(&mut self, entity: Entity, state: LifecycleState) {
        if let Some(record) = self.entities.get_mut(entity) {
            record.state = state;
        }
    }

    fn set_component_flag(&mut self, id: ComponentTypeId, slot: Slot, enabled: bool) {
        if let Some(entry) = self.stores[id.index()].entry_mut(slot) {
            entry.enabled = enabled;
        }
    }

    pub(crate) fn record(&self, entity: Entity, op: &str) -> &EntityRecord {
        self.entities
            .get(entity)
            .unwrap_or_else(|| panic!("{op} called on destroyed entity {entity}"))
    }

    fn record_mut(&mut self, entity: Entity, op: &str) -> &mut EntityRecord {
        self.entities
            .get_mut(entity)
            .unwrap_or_else(|| panic!("{op} called on destroyed entity {entity}"))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
