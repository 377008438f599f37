//! Cake Core - Core types and utilities for the Cake runtime
//!
//! This crate provides the foundational types used throughout the runtime:
//! - Frame time tracking for the game loop
//! - Engine configuration loaded from TOML

pub mod config;
pub mod time;

pub use config::{ConfigError, EngineConfig, LoopConfig};
pub use time::{GameTime, TimeConfig};
