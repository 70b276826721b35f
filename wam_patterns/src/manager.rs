use anyhow::Result;
use log::{error, info};
use serde::Serialize;

use crate::parser::parse_pattern;
use crate::player::{PatternPlayer, PlaybackStats, PlayerState};
use crate::store::{LoadError, PatternStore};

/// Lifecycle notifications published to subscribers of a [`PatternManager`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PatternEvent {
    Loaded { name: String, duration: f64 },
    Cleared,
    Started,
    Stopped,
    Paused,
    Resumed,
    Finished,
}

type Observer = Box<dyn FnMut(&PatternEvent)>;

/// Ties the pattern store to the player and tracks which pattern is loaded.
pub struct PatternManager {
    store: PatternStore,
    player: PatternPlayer,
    loaded: Option<String>,
    observers: Vec<Observer>,
}

impl PatternManager {
    pub fn new(store: PatternStore, player: PatternPlayer) -> Self {
        Self {
            store,
            player,
            loaded: None,
            observers: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&PatternEvent) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn list_patterns(&self) -> Result<Vec<String>> {
        self.store.list_patterns()
    }

    /// Loads and parses `name`. On failure the previously loaded pattern
    /// stays active.
    pub fn load_pattern(&mut self, name: &str) -> Result<(), LoadError> {
        let lines = self.store.load_pattern(name)?;
        let schedule = parse_pattern(&lines);
        let duration = schedule.duration().unwrap_or_default();
        let was_playing = self.player.is_playing();
        self.player.set_schedule(schedule);
        if was_playing {
            self.publish(PatternEvent::Stopped);
        }
        self.loaded = Some(name.to_string());
        info!("pattern {name} loaded ({duration:.3}s)");
        self.publish(PatternEvent::Loaded {
            name: name.to_string(),
            duration,
        });
        Ok(())
    }

    pub fn clear_pattern(&mut self) {
        if self.loaded.take().is_none() {
            return;
        }
        let was_playing = self.player.is_playing();
        self.player.clear();
        if was_playing {
            self.publish(PatternEvent::Stopped);
        }
        self.publish(PatternEvent::Cleared);
    }

    pub fn loaded_pattern(&self) -> Option<&str> {
        self.loaded.as_deref()
    }

    /// Starts the loaded pattern. Returns `false` when nothing is loaded.
    pub fn play_pattern(&mut self) -> bool {
        if self.loaded.is_none() {
            error!("no pattern loaded");
            return false;
        }
        if self.player.is_playing() {
            return true;
        }
        self.player.play();
        self.publish(PatternEvent::Started);
        if !self.player.is_playing() {
            self.publish(PatternEvent::Finished);
        }
        true
    }

    pub fn stop_pattern(&mut self) {
        if !self.player.is_playing() {
            return;
        }
        self.player.stop();
        self.publish(PatternEvent::Stopped);
    }

    pub fn pause_pattern(&mut self, pause: bool) {
        let before = self.player.state();
        self.player.pause(pause);
        match (before, self.player.state()) {
            (PlayerState::Running, PlayerState::Paused) => self.publish(PatternEvent::Paused),
            (PlayerState::Paused, PlayerState::Running) => self.publish(PatternEvent::Resumed),
            _ => {}
        }
    }

    /// Forwards the host frame tick to the player.
    pub fn advance(&mut self, delta_seconds: f64) -> usize {
        let was_playing = self.player.is_playing();
        let fired = self.player.advance(delta_seconds);
        if was_playing && !self.player.is_playing() {
            self.publish(PatternEvent::Finished);
        }
        fired
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    pub fn state(&self) -> PlayerState {
        self.player.state()
    }

    pub fn pattern_duration(&self) -> Option<f64> {
        self.player.duration()
    }

    pub fn stats(&self) -> PlaybackStats {
        self.player.stats()
    }

    pub fn player(&self) -> &PatternPlayer {
        &self.player
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    fn publish(&mut self, event: PatternEvent) {
        for observer in &mut self.observers {
            observer(&event);
        }
    }
}
