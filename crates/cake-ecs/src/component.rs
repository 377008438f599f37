use std::any::Any;
use std::fmt;

use crate::context::Context;
use crate::error::ComponentError;

/// Result type returned by every component callback.
pub type ComponentResult = Result<(), ComponentError>;

/// Upcast to `Any`, implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A behavior object attached to exactly one entity.
///
/// Every callback is optional. Implement only the ones the component needs; the
/// rest are no-ops.
///
/// ```ignore
/// struct Spinner { speed: f32, angle: f32 }
///
/// impl Component for Spinner {
///     fn update(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
///         self.angle += self.speed * ctx.time().delta_time;
///         Ok(())
///     }
/// }
/// ```
#[allow(unused_variables)]
pub trait Component: AsAny {
    /// Runs once, at the first flush after attachment where the owner is active.
    fn start(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        Ok(())
    }

    fn update(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        Ok(())
    }

    fn physics_update(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        Ok(())
    }

    fn graphics_update(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        Ok(())
    }

    /// The owning entity (or this component) went from disabled to active.
    fn on_enable(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        Ok(())
    }

    /// The owning entity (or this component) is about to be disabled.
    fn on_disable(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        Ok(())
    }

    /// Teardown. Runs exactly once, right before the storage slot is reclaimed.
    fn on_destroy(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        Ok(())
    }

    /// The game is shutting down; `on_destroy` follows.
    fn on_game_end(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        Ok(())
    }
}

impl dyn Component {
    pub fn is<T: Component>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Which callback is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Start,
    Update,
    PhysicsUpdate,
    GraphicsUpdate,
    Enable,
    Disable,
    Destroy,
    GameEnd,
}

impl Phase {
    /// The three per-frame phases, in dispatch order.
    pub const FRAME: [Phase; 3] = [Phase::Update, Phase::PhysicsUpdate, Phase::GraphicsUpdate];

    pub(crate) fn call(
        self,
        component: &mut dyn Component,
        ctx: &mut Context<'_>,
    ) -> ComponentResult {
        match self {
            Phase::Start => component.start(ctx),
            Phase::Update => component.update(ctx),
            Phase::PhysicsUpdate => component.physics_update(ctx),
            Phase::GraphicsUpdate => component.graphics_update(ctx),
            Phase::Enable => component.on_enable(ctx),
            Phase::Disable => component.on_disable(ctx),
            Phase::Destroy => component.on_destroy(ctx),
            Phase::GameEnd => component.on_game_end(ctx),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Start => "start",
            Phase::Update => "update",
            Phase::PhysicsUpdate => "physics_update",
            Phase::GraphicsUpdate => "graphics_update",
            Phase::Enable => "on_enable",
            Phase::Disable => "on_disable",
            Phase::Destroy => "on_destroy",
            Phase::GameEnd => "on_game_end",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Health(u32);
    impl Component for Health {}

    struct Armor;
    impl Component for Armor {}

    #[test]
    fn downcast_through_trait_object() {
        let mut boxed: Box<dyn Component> = Box::new(Health(10));
        let component: &mut dyn Component = &mut *boxed;
        assert!(component.is::<Health>());
        assert!(!component.is::<Armor>());
        component.downcast_mut::<Health>().unwrap().0 = 3;
        assert_eq!(component.downcast_ref::<Health>().unwrap().0, 3);
        assert!(component.downcast_ref::<Armor>().is_none());
    }

    #[test]
    fn phase_names() {
        assert_eq!(Phase::PhysicsUpdate.to_string(), "physics_update");
        assert_eq!(Phase::FRAME[0], Phase::Update);
        assert_eq!(Phase::FRAME[2], Phase::GraphicsUpdate);
    }
}
