//! Cake sandbox
//!
//! Builds a small scene of components, runs the frame loop for a bounded number of
//! frames and shuts down. Pass a config file path as the first argument, otherwise
//! `~/.config/cake/engine.toml` is used when present.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use cake_core::{ConfigError, EngineConfig};
use cake_ecs::{Component, ComponentResult, Context, Entity, Game, World};
use tracing::{debug, info, trace, warn};
use tracing_subscriber::EnvFilter;

/// Frames to run when the config does not set a limit.
const SANDBOX_FRAMES: u64 = 180;

/// Stand-in for presenting a frame.
const FRAME_PACING: Duration = Duration::from_millis(16);

/// Spins at a fixed rate, in degrees per second.
struct Spinner {
    speed: f32,
    angle: f32,
}

impl Component for Spinner {
    fn start(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        info!(entity = %ctx.entity(), speed = self.speed, "spinner started");
        Ok(())
    }

    fn update(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        self.angle = (self.angle + self.speed * ctx.time().delta_time) % 360.0;
        Ok(())
    }

    fn on_disable(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        debug!(entity = %ctx.entity(), angle = self.angle, "spinner paused");
        Ok(())
    }

    fn on_enable(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        debug!(entity = %ctx.entity(), angle = self.angle, "spinner resumed");
        Ok(())
    }

    fn on_destroy(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        info!(entity = %ctx.entity(), angle = self.angle, "spinner destroyed");
        Ok(())
    }
}

/// Follows the parent's spinner at a fixed radius.
struct Orbit {
    radius: f32,
    position: (f32, f32),
}

impl Component for Orbit {
    fn physics_update(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        let Some(parent) = ctx.parent() else {
            return Ok(());
        };
        if let Some(spinner) = ctx.world.get_component::<Spinner>(parent) {
            let radians = spinner.angle.to_radians();
            self.position = (self.radius * radians.cos(), self.radius * radians.sin());
        }
        Ok(())
    }

    fn graphics_update(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        let (x, y) = self.position;
        trace!(entity = %ctx.entity(), x, y, "draw moon");
        Ok(())
    }
}

/// Destroys its entity once it has lived for `seconds`.
struct Lifetime {
    seconds: f32,
}

impl Component for Lifetime {
    fn update(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        self.seconds -= ctx.time().delta_time;
        if self.seconds <= 0.0 {
            info!(entity = %ctx.entity(), "lifetime expired");
            ctx.destroy_self();
        }
        Ok(())
    }
}

/// Prints a summary when the game ends.
#[derive(Default)]
struct Reporter;

impl Component for Reporter {
    fn on_game_end(&mut self, ctx: &mut Context<'_>) -> ComponentResult {
        info!(
            frames = ctx.time().frame_count,
            seconds = ctx.time().total_time,
            entities = ctx.world.entity_count(),
            "game over"
        );
        Ok(())
    }
}

fn build_scene(world: &mut World) -> Entity {
    world.register_default::<Reporter>();

    let root = world.spawn();
    world.add_component::<Reporter>(root);
    world.add_component_with(
        root,
        Spinner {
            speed: 90.0,
            angle: 0.0,
        },
    );

    for radius in [1.0, 2.5] {
        let moon = world.spawn_child(root);
        world.add_component_with(
            moon,
            Orbit {
                radius,
                position: (radius, 0.0),
            },
        );
    }

    let comet = world.spawn();
    world.add_component_with(
        comet,
        Spinner {
            speed: 720.0,
            angle: 0.0,
        },
    );
    world.add_component_with(comet, Lifetime { seconds: 1.0 });

    root
}

/// Where the config came from. Reported once logging is up.
enum ConfigOrigin {
    File(PathBuf),
    Defaults,
    Fallback(PathBuf, ConfigError),
}

/// Load `explicit` strictly, otherwise `fallback` when it exists, otherwise defaults.
fn load_config(
    explicit: Option<PathBuf>,
    fallback: Option<PathBuf>,
) -> Result<(EngineConfig, ConfigOrigin)> {
    if let Some(path) = explicit {
        let config = EngineConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?;
        return Ok((config, ConfigOrigin::File(path)));
    }

    let Some(path) = fallback.filter(|p| p.exists()) else {
        return Ok((EngineConfig::default(), ConfigOrigin::Defaults));
    };
    Ok(match EngineConfig::load(&path) {
        Ok(config) => (config, ConfigOrigin::File(path)),
        Err(e) => (EngineConfig::default(), ConfigOrigin::Fallback(path, e)),
    })
}

fn main() -> Result<()> {
    let explicit = std::env::args().nth(1).map(PathBuf::from);
    let (mut config, origin) = load_config(explicit, EngineConfig::default_path())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.game_loop.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match origin {
        ConfigOrigin::File(path) => info!("Loaded engine config from {:?}", path),
        ConfigOrigin::Defaults => info!("No config file found, using defaults"),
        ConfigOrigin::Fallback(path, e) => warn!("{} in {:?}, using defaults", e, path),
    }

    info!("Starting Cake sandbox...");

    config.game_loop.max_frames.get_or_insert(SANDBOX_FRAMES);
    let mut game = Game::with_config(config);
    let root = build_scene(game.world_mut());

    game.run(|frame| {
        let count = frame.time.frame_count;
        if count % 60 == 0 {
            debug!(frame = count, entities = frame.world.entity_count(), "frame");
        }
        // Freeze the spinner and its moons for a second midway through.
        if count == 60 {
            frame.world.disable(root);
        } else if count == 120 {
            frame.world.enable(root);
        }
        std::thread::sleep(FRAME_PACING);
        Ok(())
    })
    .context("Game loop failed")?;

    info!("Cake sandbox finished after {} frames", game.frame_count());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn scratch_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("cake-{}-{name}", std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn malformed_default_config_falls_back() {
        let path = scratch_file("malformed.toml", "[game_loop\nmax_frames = ");
        let (config, origin) = load_config(None, Some(path.clone())).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config, EngineConfig::default());
        assert!(matches!(origin, ConfigOrigin::Fallback(p, ConfigError::Parse(_)) if p == path));
    }

    #[test]
    fn missing_default_config_uses_defaults() {
        let path = std::env::temp_dir().join("cake-does-not-exist.toml");
        let (_, origin) = load_config(None, Some(path)).unwrap();
        assert!(matches!(origin, ConfigOrigin::Defaults));
    }

    #[test]
    fn explicit_config_must_load() {
        let path = scratch_file("explicit.toml", "[game_loop]\nmax_frames = 7\n");
        let (config, origin) = load_config(Some(path.clone()), None).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.game_loop.max_frames, Some(7));
        assert!(matches!(origin, ConfigOrigin::File(_)));

        let missing = std::env::temp_dir().join("cake-missing-explicit.toml");
        assert!(load_config(Some(missing), None).is_err());
    }
}
