#![allow(dead_code)]

use std::sync::Arc;

use cake_ecs::{Component, ComponentResult, Context};
use parking_lot::Mutex;

/// Shared record of callback invocations, in call order.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }
}

/// Logs `<callback>:<name>` for every callback it receives.
pub struct Recorder {
    pub name: String,
    pub log: Log,
}

impl Recorder {
    pub fn new(name: &str, log: &Log) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
        }
    }

    fn record(&self, callback: &str) {
        self.log.push(format!("{callback}:{}", self.name));
    }
}

impl Component for Recorder {
    fn start(&mut self, _ctx: &mut Context<'_>) -> ComponentResult {
        self.record("start");
        Ok(())
    }

    fn update(&mut self, _ctx: &mut Context<'_>) -> ComponentResult {
        self.record("update");
        Ok(())
    }

    fn physics_update(&mut self, _ctx: &mut Context<'_>) -> ComponentResult {
        self.record("physics");
        Ok(())
    }

    fn graphics_update(&mut self, _ctx: &mut Context<'_>) -> ComponentResult {
        self.record("graphics");
        Ok(())
    }

    fn on_enable(&mut self, _ctx: &mut Context<'_>) -> ComponentResult {
        self.record("enable");
        Ok(())
    }

    fn on_disable(&mut self, _ctx: &mut Context<'_>) -> ComponentResult {
        self.record("disable");
        Ok(())
    }

    fn on_destroy(&mut self, _ctx: &mut Context<'_>) -> ComponentResult {
        self.record("destroy");
        Ok(())
    }

    fn on_game_end(&mut self, _ctx: &mut Context<'_>) -> ComponentResult {
        self.record("game_end");
        Ok(())
    }
}

pub fn strings(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|e| e.to_string()).collect()
}
