use std::fmt;

use crate::lifecycle::LifecycleState;
use crate::registry::ComponentTypeId;
use crate::store::Slot;

/// A generational entity handle.
///
/// A handle is never equal to any other handle issued by the same table, even after its
/// slot has been recycled.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Entity {
    /// Rebuild a handle from its parts.
    pub fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slot index of this entity.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The generation of this entity (incremented on reuse).
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Everything the table knows about one live entity.
#[derive(Debug)]
pub(crate) struct EntityRecord {
    pub state: LifecycleState,
    pub parent: Option<Entity>,
    /// Direct children in insertion order.
    pub children: Vec<Entity>,
    /// Attached components in attachment order.
    pub components: Vec<(ComponentTypeId, Slot)>,
}

impl EntityRecord {
    fn new(parent: Option<Entity>) -> Self {
        Self {
            state: LifecycleState::Constructing,
            parent,
            children: Vec::new(),
            components: Vec::new(),
        }
    }

    pub fn slot_of(&self, id: ComponentTypeId) -> Option<Slot> {
        self.components
            .iter()
            .find(|(key, _)| *key == id)
            .map(|(_, slot)| *slot)
    }
}

/// The global entity table. Allocates and recycles entity slots with generational
/// tracking, and keeps the parent/child links of every live entity.
///
/// Links are plain handles into this table; the table is the only owner of an entity.
pub(crate) struct EntityTable {
    generations: Vec<u32>,
    records: Vec<Option<EntityRecord>>,
    free_list: Vec<u32>,
    /// Entities without a parent, in creation order.
    roots: Vec<Entity>,
    len: usize,
}

impl EntityTable {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            records: Vec::new(),
            free_list: Vec::new(),
            roots: Vec::new(),
            len: 0,
        }
    }

    /// Allocate a new entity, reusing a freed slot if available. The entity is appended
    /// to `parent`'s children, or to the root list when it has no parent.
    pub fn allocate(&mut self, parent: Option<Entity>) -> Entity {
        self.len += 1;
        let entity = if let Some(index) = self.free_list.pop() {
            self.records[index as usize] = Some(EntityRecord::new(parent));
            Entity {
                index,
                generation: self.generations[index as usize],
            }
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.records.push(Some(EntityRecord::new(parent)));
            Entity {
                index,
                generation: 0,
            }
        };
        self.link(entity, parent);
        entity
    }

    /// Remove an entity from the table, unlinking it from its parent. Returns the
    /// record it held, or `None` if the handle was stale.
    pub fn deallocate(&mut self, entity: Entity) -> Option<EntityRecord> {
        if !self.is_alive(entity) {
            return None;
        }
        self.unlink(entity);
        let idx = entity.index as usize;
        let record = self.records[idx].take();
        // A slot whose generation is exhausted is retired instead of recycled.
        if let Some(next) = self.generations[idx].checked_add(1) {
            self.generations[idx] = next;
            self.free_list.push(entity.index);
        }
        self.len -= 1;
        record
    }

    /// Check if an entity is currently alive.
    pub fn is_alive(&self, entity: Entity) -> bool {
        let idx = entity.index as usize;
        idx < self.records.len()
            && self.records[idx].is_some()
            && self.generations[idx] == entity.generation
    }

    pub fn get(&self, entity: Entity) -> Option<&EntityRecord> {
        if !self.is_alive(entity) {
            return None;
        }
        self.records[entity.index as usize].as_ref()
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut EntityRecord> {
        if !self.is_alive(entity) {
            return None;
        }
        self.records[entity.index as usize].as_mut()
    }

    /// Direct children of an entity; empty for stale handles.
    pub fn children(&self, entity: Entity) -> &[Entity] {
        self.get(entity).map_or(&[], |r| r.children.as_slice())
    }

    pub fn roots(&self) -> &[Entity] {
        &self.roots
    }

    /// Move `entity` under `parent` (or to the root list), appending it last.
    pub fn reparent(&mut self, entity: Entity, parent: Option<Entity>) {
        self.unlink(entity);
        if let Some(record) = self.get_mut(entity) {
            record.parent = parent;
        }
        self.link(entity, parent);
    }

    /// Whether `ancestor` is `entity` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: Entity, entity: Entity) -> bool {
        let mut current = Some(entity);
        while let Some(e) = current {
            if e == ancestor {
                return true;
            }
            current = self.get(e).and_then(|r| r.parent);
        }
        false
    }

    /// Number of currently alive entities.
    pub fn len(&self) -> usize {
        self.len
    }

    fn link(&mut self, entity: Entity, parent: Option<Entity>) {
        match parent {
            Some(parent) => {
                if let Some(record) = self.get_mut(parent) {
                    record.children.push(entity);
                }
            }
            None => self.roots.push(entity),
        }
    }

    fn unlink(&mut self, entity: Entity) {
        match self.get(entity).and_then(|r| r.parent) {
            Some(parent) => {
                if let Some(record) = self.get_mut(parent) {
                    record.children.retain(|&c| c != entity);
                }
            }
            None => self.roots.retain(|&r| r != entity),
        }
    }
}

impl Default for EntityTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_sequential() {
        let mut table = EntityTable::new();
        let e0 = table.allocate(None);
        let e1 = table.allocate(None);
        assert_eq!(e0.index, 0);
        assert_eq!(e1.index, 1);
        assert_eq!(e0.generation, 0);
        assert_eq!(table.len(), 2);
        assert_eq!(table.roots(), &[e0, e1]);
    }

    #[test]
    fn deallocate_and_reuse() {
        let mut table = EntityTable::new();
        let e0 = table.allocate(None);
        assert!(table.deallocate(e0).is_some());
        let e0_reused = table.allocate(None);
        assert_eq!(e0_reused.index, 0);
        assert_eq!(e0_reused.generation, 1);
        assert_ne!(e0, e0_reused);
    }

    #[test]
    fn double_deallocate_fails() {
        let mut table = EntityTable::new();
        let e = table.allocate(None);
        assert!(table.deallocate(e).is_some());
        assert!(table.deallocate(e).is_none());
    }

    #[test]
    fn stale_entity_not_alive() {
        let mut table = EntityTable::new();
        let e0 = table.allocate(None);
        table.deallocate(e0);
        assert!(!table.is_alive(e0));
        assert!(table.get(e0).is_none());
        let e0_new = table.allocate(None);
        assert!(table.is_alive(e0_new));
    }

    #[test]
    fn children_keep_insertion_order() {
        let mut table = EntityTable::new();
        let root = table.allocate(None);
        let a = table.allocate(Some(root));
        let b = table.allocate(Some(root));
        assert_eq!(table.children(root), &[a, b]);
        assert_eq!(table.get(a).unwrap().parent, Some(root));
        assert_eq!(table.roots(), &[root]);
    }

    #[test]
    fn deallocate_unlinks_from_parent() {
        let mut table = EntityTable::new();
        let root = table.allocate(None);
        let a = table.allocate(Some(root));
        let b = table.allocate(Some(root));
        table.deallocate(a);
        assert_eq!(table.children(root), &[b]);
        assert!(table.children(a).is_empty());
    }

    #[test]
    fn reparent_moves_to_end() {
        let mut table = EntityTable::new();
        let r1 = table.allocate(None);
        let r2 = table.allocate(None);
        let a = table.allocate(Some(r1));
        let b = table.allocate(Some(r2));
        table.reparent(a, Some(r2));
        assert!(table.children(r1).is_empty());
        assert_eq!(table.children(r2), &[b, a]);

        table.reparent(b, None);
        assert_eq!(table.roots(), &[r1, r2, b]);
        assert!(table.is_ancestor_or_self(r2, a));
        assert!(!table.is_ancestor_or_self(r1, a));
    }

    #[test]
    fn exhausted_slot_is_retired() {
        let mut table = EntityTable::new();
        let old = table.allocate(None);
        table.generations[old.index as usize] = u32::MAX;
        let last = Entity::from_raw(old.index, u32::MAX);
        assert!(table.is_alive(last));

        table.deallocate(last);
        let fresh = table.allocate(None);
        assert_ne!(fresh.index, old.index);
        assert!(!table.is_alive(last));
        assert!(!table.is_alive(old));
        assert_eq!(table.len(), 1);
    }
}
