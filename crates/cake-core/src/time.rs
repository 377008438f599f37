//! Frame time for the Cake runtime
//!
//! Tracks delta time, total elapsed time and the frame counter that the game loop
//! advances once per frame. Components read it through their callback context.

use serde::{Deserialize, Serialize};

/// Scaling and clamping applied to raw frame deltas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// How many in-game seconds pass per real second
    pub time_scale: f32,
    /// Longest step a single frame may advance; longer gaps are clamped
    pub max_delta_time: f32,
    /// Nominal step (in seconds) physics-style components should integrate with
    pub fixed_timestep: f32,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            max_delta_time: 0.25,
            fixed_timestep: 1.0 / 60.0,
        }
    }
}

/// Clock advanced once per frame by the game loop
#[derive(Debug, Clone, Default)]
pub struct GameTime {
    pub config: TimeConfig,
    /// Time since game start in seconds
    pub total_time: f64,
    /// Delta time for this frame (clamped and scaled)
    pub delta_time: f32,
    /// Clamped but unscaled delta, still advancing while paused
    pub unscaled_delta_time: f32,
    /// Frames started so far; the first frame is 1
    pub frame_count: u64,
    pub paused: bool,
}

impl GameTime {
    pub fn new(config: TimeConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Advance to the next frame with the raw delta measured since the previous one
    pub fn update(&mut self, raw_delta: f32) {
        self.unscaled_delta_time = raw_delta.clamp(0.0, self.config.max_delta_time);
        self.frame_count += 1;

        if self.paused {
            self.delta_time = 0.0;
            return;
        }

        self.delta_time = self.unscaled_delta_time * self.config.time_scale;
        self.total_time += self.delta_time as f64;
    }

    /// The configured fixed step, in seconds
    pub fn fixed_timestep(&self) -> f32 {
        self.config.fixed_timestep
    }

    /// Freeze scaled time. Frames keep counting.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Set the time scale (0.0 = frozen, 1.0 = normal, 2.0 = double speed)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.config.time_scale = scale.max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_freezes_scaled_time() {
        let mut time = GameTime::default();
        time.update(0.016);

        assert!(time.delta_time > 0.0);
        assert_eq!(time.frame_count, 1);

        time.pause();
        time.update(0.016);
        assert_eq!(time.delta_time, 0.0);
        assert_eq!(time.frame_count, 2);
    }

    #[test]
    fn test_delta_is_clamped() {
        let mut time = GameTime::default();
        time.update(3.0);
        assert_eq!(time.unscaled_delta_time, 0.25);
        assert_eq!(time.delta_time, 0.25);
    }

    #[test]
    fn test_time_scale() {
        let mut time = GameTime::default();
        time.set_time_scale(2.0);
        time.update(0.1);
        assert!((time.delta_time - 0.2).abs() < 1e-6);

        time.set_time_scale(-1.0);
        assert_eq!(time.config.time_scale, 0.0);
    }
}
