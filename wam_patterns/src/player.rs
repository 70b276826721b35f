use log::{debug, error, info};
use serde::Serialize;

use crate::dispatcher::ActionDispatcher;
use crate::schedule::Schedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlayerState {
    Idle,
    Running,
    Paused,
}

/// Counters accumulated over the player's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlaybackStats {
    pub steps_fired: usize,
    pub actions_dispatched: usize,
    pub actions_failed: usize,
}

#[derive(Debug, Clone, Default)]
struct PlaybackCursor {
    offsets: Vec<f64>,
    index: usize,
    remaining_wait: f64,
    running: bool,
    paused: bool,
}

impl PlaybackCursor {
    fn rewind(&mut self) {
        self.index = 0;
        self.remaining_wait = 0.0;
        self.running = false;
        self.paused = false;
    }
}

/// Plays a [`Schedule`] back against the dispatcher, one host frame at a
/// time.
///
/// Time only moves inside [`PatternPlayer::advance`]; the player never reads
/// a clock. Waits are countdowns, and any overshoot past a step carries into
/// the next wait so steps stay anchored to their offsets from pattern start.
pub struct PatternPlayer {
    schedule: Option<Schedule>,
    cursor: PlaybackCursor,
    dispatcher: ActionDispatcher,
    stats: PlaybackStats,
}

impl PatternPlayer {
    pub fn new(dispatcher: ActionDispatcher) -> Self {
        Self {
            schedule: None,
            cursor: PlaybackCursor::default(),
            dispatcher,
            stats: PlaybackStats::default(),
        }
    }

    /// Installs a new schedule, replacing the previous one. Schedules without
    /// steps are ignored. Returns whether the schedule was accepted.
    pub fn set_schedule(&mut self, schedule: Schedule) -> bool {
        if schedule.is_empty() {
            return false;
        }
        if self.cursor.running {
            info!("replacing the schedule stops the pattern in progress");
            self.stop();
        }
        self.cursor.offsets = schedule.offsets();
        self.cursor.rewind();
        self.schedule = Some(schedule);
        true
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    /// Drops the schedule, stopping playback first.
    pub fn clear(&mut self) {
        self.stop();
        self.schedule = None;
        self.cursor = PlaybackCursor::default();
    }

    pub fn play(&mut self) {
        if self.cursor.running || self.cursor.offsets.is_empty() {
            return;
        }
        self.cursor.rewind();
        self.cursor.running = true;
        info!(
            "pattern playback started ({} steps)",
            self.cursor.offsets.len()
        );

        let first = self.cursor.offsets[0];
        if first == 0.0 {
            self.fire_step();
        } else {
            self.cursor.remaining_wait = first;
        }
    }

    pub fn stop(&mut self) {
        if !self.cursor.running {
            return;
        }
        self.cursor.rewind();
        info!("pattern playback stopped");
    }

    pub fn pause(&mut self, pause: bool) {
        if !self.cursor.running || self.cursor.paused == pause {
            return;
        }
        self.cursor.paused = pause;
        debug!(
            "pattern playback {} with {:.3}s left before next step",
            if pause { "paused" } else { "resumed" },
            self.cursor.remaining_wait
        );
    }

    /// Host frame tick. Returns how many steps fired.
    pub fn advance(&mut self, delta_seconds: f64) -> usize {
        if !self.cursor.running || self.cursor.paused {
            return 0;
        }
        if !delta_seconds.is_finite() || delta_seconds <= 0.0 {
            return 0;
        }

        self.cursor.remaining_wait -= delta_seconds;
        let mut fired = 0;
        while self.cursor.running && self.cursor.remaining_wait <= 0.0 {
            self.fire_step();
            fired += 1;
        }
        fired
    }

    pub fn state(&self) -> PlayerState {
        match (self.cursor.running, self.cursor.paused) {
            (false, _) => PlayerState::Idle,
            (true, false) => PlayerState::Running,
            (true, true) => PlayerState::Paused,
        }
    }

    /// True while a pattern is in progress, paused or not.
    pub fn is_playing(&self) -> bool {
        self.cursor.running
    }

    pub fn is_paused(&self) -> bool {
        self.cursor.running && self.cursor.paused
    }

    pub fn duration(&self) -> Option<f64> {
        self.cursor.offsets.last().copied()
    }

    /// Seconds left before the next step, while playing.
    pub fn remaining_wait(&self) -> Option<f64> {
        self.cursor.running.then_some(self.cursor.remaining_wait)
    }

    /// Seconds since the pattern started, while playing.
    pub fn position(&self) -> Option<f64> {
        if !self.cursor.running {
            return None;
        }
        let next = self.cursor.offsets.get(self.cursor.index)?;
        Some(next - self.cursor.remaining_wait)
    }

    pub fn next_step_index(&self) -> usize {
        self.cursor.index
    }

    pub fn stats(&self) -> PlaybackStats {
        self.stats
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut ActionDispatcher {
        &mut self.dispatcher
    }

    fn fire_step(&mut self) {
        let index = self.cursor.index;
        if let Some(step) = self.schedule.as_ref().and_then(|s| s.step(index)) {
            debug!(
                "pattern step {} at {:.3}s ({} actions)",
                index,
                step.offset,
                step.actions.len()
            );
            for action in &step.actions {
                self.stats.actions_dispatched += 1;
                if let Err(err) = self.dispatcher.dispatch(action) {
                    self.stats.actions_failed += 1;
                    error!("pattern action {action} at {:.3}s failed: {err}", step.offset);
                }
            }
        }
        self.stats.steps_fired += 1;

        match self.cursor.offsets.get(index + 1) {
            Some(next) => {
                self.cursor.remaining_wait += next - self.cursor.offsets[index];
                self.cursor.index = index + 1;
            }
            None => {
                self.cursor.rewind();
                info!("pattern playback finished");
            }
        }
    }
}
