//! # Entity hierarchies — parent/child queries
//!
//! Parent and child links are plain [`Entity`] handles kept by the entity table. They
//! are relations, not ownership: destroying a parent reaches its children through
//! [`World::destroy`], which walks the subtree.
//!
//! ## Usage
//!
//! ```ignore
//! let root = world.spawn();
//! let arm = world.spawn_child(root);
//! let hand = world.spawn_child(arm);
//!
//! assert_eq!(world.children(root), &[arm]);
//! let all: Vec<_> = world.subtree(root).collect(); // [root, arm, hand]
//! ```

use crate::component::Component;
use crate::entity::{Entity, EntityTable};
use crate::world::World;

/// Pre-order walk over an entity and all of its descendants.
///
/// Reflects the structure at the time each step is taken; finish the walk before the
/// next flush.
pub struct Subtree<'w> {
    table: &'w EntityTable,
    stack: Vec<Entity>,
}

impl<'w> Subtree<'w> {
    fn new(table: &'w EntityTable, root: Entity) -> Self {
        let stack = if table.is_alive(root) {
            vec![root]
        } else {
            Vec::new()
        };
        Self { table, stack }
    }
}

impl Iterator for Subtree<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let entity = self.stack.pop()?;
        self.stack
            .extend(self.table.children(entity).iter().rev().copied());
        Some(entity)
    }
}

impl World {
    /// Direct children of `entity` in insertion order. Empty for stale handles.
    pub fn children(&self, entity: Entity) -> &[Entity] {
        self.entities.children(entity)
    }

    pub fn parent(&self, entity: Entity) -> Option<Entity> {
        self.entities.get(entity)?.parent
    }

    /// Entities without a parent, in creation order.
    pub fn roots(&self) -> &[Entity] {
        self.entities.roots()
    }

    /// `entity` followed by all of its descendants, parents before children.
    pub fn subtree(&self, entity: Entity) -> Subtree<'_> {
        Subtree::new(&self.entities, entity)
    }

    /// Every `T` found on `entity` or any of its descendants.
    pub fn get_components_in_children<T: Component>(&self, entity: Entity) -> Vec<&T> {
        let id = self.registry.id_of::<T>();
        let store = &self.stores[id.index()];
        self.subtree(entity)
            .filter_map(|e| store.get(e)?.downcast_ref::<T>())
            .collect()
    }

    /// Whether `entity` and every one of its ancestors are active.
    pub fn is_active_in_hierarchy(&self, entity: Entity) -> bool {
        let mut current = Some(entity);
        while let Some(e) = current {
            match self.entities.get(e) {
                Some(record) if record.state.is_active() => current = record.parent,
                _ => return false,
            }
        }
        true
    }

    /// Move `child` under `parent` (or make it a root) at the next flush. The child
    /// becomes the last child of its new parent.
    ///
    /// # Panics
    ///
    /// Panics if either entity is destroyed or pending destruction, or if `parent` is
    /// `child` itself or one of its descendants.
    pub fn set_parent(&mut self, child: Entity, parent: Option<Entity>) {
        let state = self.record(child, "set_parent").state;
        assert!(
            !state.is_dying(),
            "cannot reparent entity {child}, which is pending destruction"
        );
        if let Some(parent) = parent {
            let parent_state = self.record(parent, "set_parent").state;
            assert!(
                !parent_state.is_dying(),
                "cannot reparent under entity {parent}, which is pending destruction"
            );
            assert!(
                !self.entities.is_ancestor_or_self(child, parent),
                "cannot make entity {parent} the parent of its own ancestor {child}"
            );
        }
        self.scheduler.reparent(child, parent);
    }

    /// Active entities in dispatch order. Subtrees under an inactive entity are skipped.
    pub(crate) fn active_preorder(&self) -> Vec<Entity> {
        let mut order = Vec::new();
        let mut stack: Vec<Entity> = self.entities.roots().iter().rev().copied().collect();
        while let Some(entity) = stack.pop() {
            let Some(record) = self.entities.get(entity) else {
                continue;
            };
            if !record.state.is_active() {
                continue;
            }
            order.push(entity);
            stack.extend(record.children.iter().rev().copied());
        }
        order
    }

    /// `root`'s subtree with every descendant ahead of its ancestors.
    pub(crate) fn post_order(&self, root: Entity) -> Vec<Entity> {
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((entity, expanded)) = stack.pop() {
            if expanded {
                order.push(entity);
                continue;
            }
            if !self.entities.is_alive(entity) {
                continue;
            }
            stack.push((entity, true));
            for &child in self.entities.children(entity).iter().rev() {
                stack.push((child, false));
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use cake_core::GameTime;

    use super::*;
    use crate::game::GameHandle;

    struct Marker(u32);
    impl Component for Marker {}

    /// a ─┬─ b ── d
    ///    └─ c
    fn tree(world: &mut World) -> [Entity; 4] {
        let a = world.spawn();
        let b = world.spawn_child(a);
        let c = world.spawn_child(a);
        let d = world.spawn_child(b);
        [a, b, c, d]
    }

    fn flush(world: &mut World) {
        world.flush(&GameTime::default(), &GameHandle::new()).unwrap();
    }

    #[test]
    fn children_in_insertion_order() {
        let mut world = World::new();
        let [a, b, c, d] = tree(&mut world);
        assert_eq!(world.children(a), &[b, c]);
        assert_eq!(world.children(b), &[d]);
        assert!(world.children(c).is_empty());
        assert_eq!(world.parent(d), Some(b));
        assert_eq!(world.parent(a), None);
        assert_eq!(world.roots(), &[a]);
    }

    #[test]
    fn subtree_is_preorder_and_restartable() {
        let mut world = World::new();
        let [a, b, c, d] = tree(&mut world);
        let first: Vec<_> = world.subtree(a).collect();
        assert_eq!(first, vec![a, b, d, c]);
        let second: Vec<_> = world.subtree(a).collect();
        assert_eq!(first, second);
        assert_eq!(world.subtree(b).collect::<Vec<_>>(), vec![b, d]);
    }

    #[test]
    fn post_order_puts_descendants_first() {
        let mut world = World::new();
        let [a, b, c, d] = tree(&mut world);
        assert_eq!(world.post_order(a), vec![d, b, c, a]);
    }

    #[test]
    fn destroyed_subtree_disappears_from_queries() {
        let mut world = World::new();
        let [a, b, c, d] = tree(&mut world);
        world.destroy(b);
        assert_eq!(world.subtree(a).count(), 4);

        flush(&mut world);
        assert_eq!(world.children(a), &[c]);
        assert_eq!(world.subtree(a).collect::<Vec<_>>(), vec![a, c]);
        assert_eq!(world.subtree(b).count(), 0);
        assert!(!world.is_alive(d));
    }

    #[test]
    fn components_in_children_include_root() {
        let mut world = World::new();
        let [a, b, c, d] = tree(&mut world);
        world.add_component_with(a, Marker(1));
        world.add_component_with(d, Marker(4));
        world.add_component_with(c, Marker(3));

        let mut found: Vec<u32> = world
            .get_components_in_children::<Marker>(a)
            .iter()
            .map(|m| m.0)
            .collect();
        found.sort();
        assert_eq!(found, vec![1, 3, 4]);
        assert!(world.get_components_in_children::<Marker>(b).len() == 1);
    }

    #[test]
    fn inactive_ancestor_hides_subtree() {
        let mut world = World::new();
        let [a, b, c, d] = tree(&mut world);
        flush(&mut world);
        assert_eq!(world.active_preorder(), vec![a, b, d, c]);

        world.disable(b);
        flush(&mut world);
        assert_eq!(world.active_preorder(), vec![a, c]);
        assert!(!world.is_active_in_hierarchy(d));
        assert!(world.state(d).is_active());
    }

    #[test]
    fn reparent_is_deferred() {
        let mut world = World::new();
        let [a, b, c, d] = tree(&mut world);
        world.set_parent(d, Some(c));
        assert_eq!(world.parent(d), Some(b));

        flush(&mut world);
        assert_eq!(world.parent(d), Some(c));
        assert!(world.children(b).is_empty());

        world.set_parent(c, None);
        flush(&mut world);
        assert_eq!(world.roots(), &[a, c]);
        assert_eq!(world.subtree(c).collect::<Vec<_>>(), vec![c, d]);
    }

    #[test]
    #[should_panic(expected = "its own ancestor")]
    fn reparent_into_own_subtree_panics() {
        let mut world = World::new();
        let [a, _, _, d] = tree(&mut world);
        world.set_parent(a, Some(d));
    }
}
