//! The frame loop.
//!
//! [`Game`] owns the [`World`] and drives it one frame at a time:
//!
//! 1. flush pending lifecycle transitions
//! 2. `update` on every active component
//! 3. `physics_update` likewise
//! 4. `graphics_update` likewise
//! 5. the embedding application's frame body (event polling, presentation, ...)
//!
//! The loop stops once [`GameHandle::end`] has been called, checked at the top of each
//! iteration. On the way out every component receives `on_game_end` followed by its
//! ordinary teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use cake_core::{EngineConfig, GameTime, LoopConfig};
use tracing::{info, warn};

use crate::component::Phase;
use crate::error::{BoxError, EcsError};
use crate::world::World;

/// Shutdown gives components spawned during teardown this many extra passes.
const MAX_SHUTDOWN_PASSES: usize = 4;

/// Cloneable handle that ends the game from anywhere.
#[derive(Debug, Clone, Default)]
pub struct GameHandle {
    ending: Arc<AtomicBool>,
}

impl GameHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the loop at the next frame boundary.
    pub fn end(&self) {
        self.ending.store(true, Ordering::Release);
    }

    pub fn is_ending(&self) -> bool {
        self.ending.load(Ordering::Acquire)
    }
}

/// What the embedding application's frame body gets to see.
pub struct Frame<'a> {
    pub world: &'a mut World,
    pub time: &'a GameTime,
    pub game: &'a GameHandle,
}

pub struct Game {
    world: World,
    time: GameTime,
    handle: GameHandle,
    config: LoopConfig,
    last_frame: Option<Instant>,
}

impl Game {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            world: World::new(),
            time: GameTime::new(config.time),
            handle: GameHandle::new(),
            config: config.game_loop,
            last_frame: None,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn time(&self) -> &GameTime {
        &self.time
    }

    /// A handle that can end the game from outside the loop.
    pub fn handle(&self) -> GameHandle {
        self.handle.clone()
    }

    pub fn end(&self) {
        self.handle.end();
    }

    pub fn frame_count(&self) -> u64 {
        self.time.frame_count
    }

    /// Run one frame without a frame body: advance time, flush, then the three
    /// dispatch phases.
    pub fn step(&mut self) -> Result<(), EcsError> {
        self.advance_time();
        self.world.flush(&self.time, &self.handle)?;
        for phase in Phase::FRAME {
            self.world.dispatch(phase, &self.time, &self.handle)?;
        }
        Ok(())
    }

    /// Run frames until the game is ended, calling `frame_body` after the dispatch
    /// phases of every frame, then shut down.
    ///
    /// An error from a callback or from the frame body aborts the loop immediately,
    /// without shutdown.
    pub fn run<F>(&mut self, mut frame_body: F) -> Result<(), EcsError>
    where
        F: FnMut(&mut Frame<'_>) -> Result<(), BoxError>,
    {
        info!("Starting game loop");
        loop {
            if let Some(max) = self.config.max_frames {
                if self.time.frame_count >= max {
                    self.handle.end();
                }
            }
            if self.handle.is_ending() {
                break;
            }

            self.step()?;
            let mut frame = Frame {
                world: &mut self.world,
                time: &self.time,
                game: &self.handle,
            };
            frame_body(&mut frame).map_err(EcsError::FrameBody)?;
        }
        self.shutdown()
    }

    /// Notify every live component that the game is ending, then destroy everything.
    pub fn shutdown(&mut self) -> Result<(), EcsError> {
        info!(frames = self.time.frame_count, "Game ending");
        self.world.notify_game_end(&self.time, &self.handle)?;

        for _ in 0..MAX_SHUTDOWN_PASSES {
            if self.world.entity_count() == 0 {
                break;
            }
            self.world.destroy_all();
            self.world.flush(&self.time, &self.handle)?;
        }

        let remaining = self.world.entity_count();
        if remaining > 0 {
            warn!(remaining, "entities still alive after shutdown");
        }
        Ok(())
    }

    fn advance_time(&mut self) {
        let now = Instant::now();
        let raw = self
            .last_frame
            .map_or(0.0, |last| now.duration_since(last).as_secs_f32());
        self.last_frame = Some(now);
        self.time.update(raw);
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}
