use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::Serialize;
use wam_patterns::{
    ActionDispatcher, CallLog, EyePatch, HostCall, ModifierControl, ModifierSnapshot,
    ModifierState, PatternEvent, PatternManager, PatternPlayer, PatternStore, PlaybackStats,
    RecordingGame, RecordingWall,
};

use crate::cli::PlayArgs;

/// A collaborator call stamped with the session clock at the end of the frame
/// that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct TimedCall {
    pub time: f64,
    #[serde(flatten)]
    pub call: HostCall,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimedEvent {
    pub time: f64,
    #[serde(flatten)]
    pub event: PatternEvent,
}

#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub pattern: String,
    pub duration: f64,
    pub tick: f64,
    pub seed: Option<u64>,
    pub frames: u64,
    pub elapsed: f64,
    pub stats: PlaybackStats,
    pub modifiers: ModifierSnapshot,
    pub events: Vec<TimedEvent>,
    pub calls: Vec<TimedCall>,
}

/// Plays `options.name` from `store` in a simulated frame loop until the
/// pattern finishes.
pub fn run_session(store: PatternStore, options: &PlayArgs) -> Result<SessionReport> {
    let log = CallLog::new();

    let modifiers = {
        let mut state = ModifierState::new();
        let sink = log.clone();
        state.subscribe(move |update| {
            sink.push(HostCall::ModifierUpdate {
                name: update.name.to_string(),
                value: update.value.clone(),
            })
        });
        SharedModifiers::new(state)
    };
    let snapshot_handle = modifiers.clone();

    let wall = Box::new(RecordingWall::new(log.clone()));
    let game = Box::new(RecordingGame::new(log.clone()));
    let dispatcher = match options.seed {
        Some(seed) => ActionDispatcher::with_seed(wall, game, Box::new(modifiers), seed),
        None => ActionDispatcher::new(wall, game, Box::new(modifiers)),
    };

    let mut manager = PatternManager::new(store, PatternPlayer::new(dispatcher));
    let clock = Rc::new(RefCell::new(0.0_f64));
    let events = Rc::new(RefCell::new(Vec::new()));
    {
        let clock = clock.clone();
        let events = events.clone();
        manager.subscribe(move |event| {
            events.borrow_mut().push(TimedEvent {
                time: *clock.borrow(),
                event: event.clone(),
            })
        });
    }

    manager
        .load_pattern(&options.name)
        .with_context(|| format!("loading pattern {}", options.name))?;
    let duration = manager.pattern_duration().unwrap_or_default();

    let mut calls = Vec::new();
    if !manager.play_pattern() {
        bail!("pattern {} could not be started", options.name);
    }
    stamp(&log, 0.0, &mut calls);

    let frame_budget = ((duration + options.pause_for) / options.tick).ceil() as u64 + 16;
    let mut frames = 0_u64;
    let mut pause_started: Option<f64> = None;
    let mut pause_done = false;

    while manager.is_playing() {
        let now = *clock.borrow();
        if !pause_done {
            match (options.pause_at, pause_started) {
                (Some(at), None) if now >= at => {
                    debug!("pausing at {now:.3}s for {:.3}s", options.pause_for);
                    manager.pause_pattern(true);
                    pause_started = Some(now);
                }
                (_, Some(started)) if now - started >= options.pause_for => {
                    manager.pause_pattern(false);
                    pause_done = true;
                }
                _ => {}
            }
        }

        if frames >= frame_budget {
            bail!(
                "pattern {} still running after {frames} frames of {}s",
                options.name,
                options.tick
            );
        }

        let end = now + options.tick;
        *clock.borrow_mut() = end;
        manager.advance(options.tick);
        stamp(&log, end, &mut calls);
        frames += 1;
    }

    let elapsed = *clock.borrow();
    let stats = manager.stats();
    info!(
        "pattern {} finished after {frames} frames ({elapsed:.3}s)",
        options.name
    );
    let events = events.borrow().clone();

    Ok(SessionReport {
        pattern: options.name.clone(),
        duration,
        tick: options.tick,
        seed: options.seed,
        frames,
        elapsed,
        stats,
        modifiers: snapshot_handle.snapshot(),
        events,
        calls,
    })
}

fn stamp(log: &CallLog, time: f64, calls: &mut Vec<TimedCall>) {
    calls.extend(log.drain().into_iter().map(|call| TimedCall { time, call }));
}

pub fn describe_call(call: &HostCall) -> String {
    match call {
        HostCall::WallClear => "wall clear".to_string(),
        HostCall::WallEnable => "wall enable".to_string(),
        HostCall::WallSetting { setting, value } => format!("wall {setting} = {value}"),
        HostCall::ActivateMole {
            id,
            lifetime,
            expiring_duration,
            is_fake,
        } => {
            let kind = if *is_fake { "distractor" } else { "mole" };
            format!("{kind} {id} lifetime={lifetime} expiring={expiring_duration}")
        }
        HostCall::StartGame => "game start".to_string(),
        HostCall::StopGame => "game stop".to_string(),
        HostCall::SetDifficulty { difficulty } => format!("difficulty {difficulty}"),
        HostCall::EyePatch { side } => format!("eye patch {side}"),
        HostCall::MirrorEffect { enabled } => format!("mirror effect {enabled}"),
        HostCall::DualTask { enabled } => format!("dual task {enabled}"),
        HostCall::PrismEffect { angle } => format!("prism effect {angle}"),
        HostCall::MainController { right_is_main } => {
            format!("right controller main {right_is_main}")
        }
        HostCall::ModifierUpdate { name, value } => format!("modifier {name} = {value}"),
    }
}

/// Lets the session read the final modifier snapshot after the dispatcher
/// has taken ownership of the state.
#[derive(Clone)]
struct SharedModifiers {
    state: Rc<RefCell<ModifierState>>,
}

impl SharedModifiers {
    fn new(state: ModifierState) -> Self {
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    fn snapshot(&self) -> ModifierSnapshot {
        self.state.borrow().snapshot()
    }
}

impl ModifierControl for SharedModifiers {
    fn set_eye_patch(&mut self, eye_patch: EyePatch) {
        self.state.borrow_mut().set_eye_patch(eye_patch);
    }

    fn set_mirror_effect(&mut self, enabled: bool) {
        self.state.borrow_mut().set_mirror_effect(enabled);
    }

    fn set_dual_task(&mut self, enabled: bool) {
        self.state.borrow_mut().set_dual_task(enabled);
    }

    fn set_prism_effect(&mut self, angle: f64) {
        self.state.borrow_mut().set_prism_effect(angle);
    }

    fn set_main_controller(&mut self, right_is_main: bool) {
        self.state.borrow_mut().set_main_controller(right_is_main);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use tempfile::tempdir;
    use wam_patterns::{HostCall, PatternEvent, PatternStore};

    use super::run_session;
    use crate::cli::PlayArgs;

    fn play_args(name: &str) -> PlayArgs {
        PlayArgs {
            name: name.to_string(),
            tick: 0.25,
            seed: Some(3),
            pause_at: None,
            pause_for: 0.0,
            call_log_json: None,
        }
    }

    #[test]
    fn calls_are_stamped_with_frame_end() -> Result<()> {
        let temp = tempdir()?;
        let store = PatternStore::open(temp.path(), "wampat")?;
        fs::write(
            store.path_for("short"),
            "START:()\nWAIT:(TIME=0.5)\nMOLE:(X=1,Y=2,LIFETIME=1)\nWAIT:(TIME=0.5)\nSTOP:()\n",
        )?;

        let report = run_session(store, &play_args("short"))?;
        let stamped: Vec<_> = report
            .calls
            .iter()
            .map(|timed| (timed.time, timed.call.clone()))
            .collect();
        assert_eq!(stamped[0], (0.0, HostCall::StartGame));
        assert_eq!(stamped[1].0, 0.5);
        assert!(matches!(stamped[1].1, HostCall::ActivateMole { id: 102, .. }));
        assert_eq!(stamped[2], (1.0, HostCall::StopGame));
        assert_eq!(report.duration, 1.5);
        assert_eq!(report.elapsed, 1.5);
        assert!(matches!(
            report.events.last().map(|timed| &timed.event),
            Some(PatternEvent::Finished)
        ));
        Ok(())
    }

    #[test]
    fn pause_delays_later_steps() -> Result<()> {
        let temp = tempdir()?;
        let store = PatternStore::open(temp.path(), "wampat")?;
        fs::write(store.path_for("paused"), "WAIT:(TIME=1)\nSTART:()\n")?;

        let mut args = play_args("paused");
        args.pause_at = Some(0.5);
        args.pause_for = 2.0;
        let report = run_session(store, &args)?;

        let start = report
            .calls
            .iter()
            .find(|timed| timed.call == HostCall::StartGame)
            .map(|timed| timed.time);
        assert_eq!(start, Some(3.0));
        Ok(())
    }

    #[test]
    fn modifier_changes_reach_the_call_log() -> Result<()> {
        let temp = tempdir()?;
        let store = PatternStore::open(temp.path(), "wampat")?;
        fs::write(
            store.path_for("mods"),
            "MODIFIER:(MIRROR=true,PRISMEFFECT=10)\nMODIFIER:(MIRROR=true)\n",
        )?;

        let report = run_session(store, &play_args("mods"))?;
        let updates: Vec<_> = report
            .calls
            .iter()
            .filter_map(|timed| match &timed.call {
                HostCall::ModifierUpdate { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec!["MirrorEffect", "PrismEffect"]);
        assert!(report.modifiers.mirror_effect);
        Ok(())
    }
}
