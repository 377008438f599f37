//! Cake ECS - entity/component runtime
//!
//! Entities are generational handles into a single table and form a forest through
//! parent/child links. Components are behavior objects with optional lifecycle
//! callbacks, kept in one store per component type. Every lifecycle change is queued
//! and applied by a flush at the start of each frame, so dispatch never observes a
//! slot being reclaimed under it.

mod component;
mod context;
mod entity;
mod error;
mod game;
mod hierarchy;
mod lifecycle;
mod registry;
mod scheduler;
mod store;
mod world;

pub use component::{AsAny, Component, ComponentResult, Phase};
pub use context::Context;
pub use entity::Entity;
pub use error::{BoxError, ComponentError, EcsError};
pub use game::{Frame, Game, GameHandle};
pub use hierarchy::Subtree;
pub use lifecycle::LifecycleState;
pub use registry::{ComponentTypeId, ComponentTypeRegistry};
pub use scheduler::LifecycleScheduler;
pub use store::{ComponentStore, Slot};
pub use world::World;
