//! Context — what every component callback receives.
//!
//! Gives the callback its owning [`Entity`], mutable access to the [`World`], the
//! frame [`GameTime`] and the [`GameHandle`] used to end the game. Mutations made
//! through the world are queued and applied at the next flush.

use cake_core::GameTime;

use crate::component::Component;
use crate::entity::Entity;
use crate::game::GameHandle;
use crate::world::World;

pub struct Context<'a> {
    /// The world the component lives in.
    pub world: &'a mut World,
    entity: Entity,
    time: &'a GameTime,
    game: &'a GameHandle,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        world: &'a mut World,
        entity: Entity,
        time: &'a GameTime,
        game: &'a GameHandle,
    ) -> Self {
        Self {
            world,
            entity,
            time,
            game,
        }
    }

    /// The entity owning the component being called.
    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn time(&self) -> &GameTime {
        self.time
    }

    pub fn game(&self) -> &GameHandle {
        self.game
    }

    /// Ask the loop to stop at the next frame boundary.
    pub fn end_game(&self) {
        self.game.end();
    }

    /// Destroy the owning entity (and its subtree) at the next flush.
    pub fn destroy_self(&mut self) {
        self.world.destroy(self.entity);
    }

    /// Another component on the owning entity.
    pub fn sibling<T: Component>(&self) -> Option<&T> {
        self.world.get_component::<T>(self.entity)
    }

    pub fn sibling_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.world.get_component_mut::<T>(self.entity)
    }

    pub fn parent(&self) -> Option<Entity> {
        self.world.parent(self.entity)
    }

    pub fn children(&self) -> &[Entity] {
        self.world.children(self.entity)
    }
}
