use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::host::{EyePatch, GameControl, ModifierControl, WallControl};

/// Every collaborator call a pattern can trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostCall {
    WallClear,
    WallEnable,
    WallSetting { setting: String, value: f64 },
    ActivateMole {
        id: i32,
        lifetime: f64,
        expiring_duration: f64,
        is_fake: bool,
    },
    StartGame,
    StopGame,
    SetDifficulty { difficulty: String },
    EyePatch { side: EyePatch },
    MirrorEffect { enabled: bool },
    DualTask { enabled: bool },
    PrismEffect { angle: f64 },
    MainController { right_is_main: bool },
    ModifierUpdate { name: String, value: String },
}

/// Shared, append-only record of host calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Rc<RefCell<Vec<HostCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: HostCall) {
        self.calls.borrow_mut().push(call);
    }

    pub fn snapshot(&self) -> Vec<HostCall> {
        self.calls.borrow().clone()
    }

    /// Removes and returns everything recorded so far.
    pub fn drain(&self) -> Vec<HostCall> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.borrow().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RecordingWall {
    log: CallLog,
}

impl RecordingWall {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }

    fn setting(&self, setting: &str, value: f64) {
        self.log.push(HostCall::WallSetting {
            setting: setting.to_string(),
            value,
        });
    }
}

impl WallControl for RecordingWall {
    fn clear(&mut self) {
        self.log.push(HostCall::WallClear);
    }

    fn enable(&mut self) {
        self.log.push(HostCall::WallEnable);
    }

    fn set_row_count(&mut self, rows: i32) {
        self.setting("row_count", f64::from(rows));
    }

    fn set_column_count(&mut self, columns: i32) {
        self.setting("column_count", f64::from(columns));
    }

    fn set_size_x(&mut self, value: f64) {
        self.setting("size_x", value);
    }

    fn set_size_y(&mut self, value: f64) {
        self.setting("size_y", value);
    }

    fn set_size_z(&mut self, value: f64) {
        self.setting("size_z", value);
    }

    fn set_curve_x(&mut self, value: f64) {
        self.setting("curve_x", value);
    }

    fn set_curve_y(&mut self, value: f64) {
        self.setting("curve_y", value);
    }

    fn set_max_angle(&mut self, value: f64) {
        self.setting("max_angle", value);
    }

    fn set_mole_scale_x(&mut self, value: f64) {
        self.setting("mole_scale_x", value);
    }

    fn set_mole_scale_y(&mut self, value: f64) {
        self.setting("mole_scale_y", value);
    }

    fn set_mole_scale_z(&mut self, value: f64) {
        self.setting("mole_scale_z", value);
    }

    fn activate_mole(&mut self, id: i32, lifetime: f64, expiring_duration: f64, is_fake: bool) {
        self.log.push(HostCall::ActivateMole {
            id,
            lifetime,
            expiring_duration,
            is_fake,
        });
    }
}

/// Mole expiring duration used by the game when nothing else is configured.
pub const DEFAULT_MOLE_EXPIRING_DURATION: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct RecordingGame {
    log: CallLog,
    mole_expiring_duration: f64,
}

impl RecordingGame {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            mole_expiring_duration: DEFAULT_MOLE_EXPIRING_DURATION,
        }
    }

    pub fn with_mole_expiring_duration(mut self, seconds: f64) -> Self {
        self.mole_expiring_duration = seconds;
        self
    }
}

impl GameControl for RecordingGame {
    fn start_game(&mut self) {
        self.log.push(HostCall::StartGame);
    }

    fn stop_game(&mut self) {
        self.log.push(HostCall::StopGame);
    }

    fn set_difficulty(&mut self, difficulty: &str) {
        self.log.push(HostCall::SetDifficulty {
            difficulty: difficulty.to_string(),
        });
    }

    fn mole_expiring_duration(&self) -> f64 {
        self.mole_expiring_duration
    }
}

/// Records raw modifier calls without keeping any state.
#[derive(Debug, Clone)]
pub struct RecordingModifiers {
    log: CallLog,
}

impl RecordingModifiers {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl ModifierControl for RecordingModifiers {
    fn set_eye_patch(&mut self, side: EyePatch) {
        self.log.push(HostCall::EyePatch { side });
    }

    fn set_mirror_effect(&mut self, enabled: bool) {
        self.log.push(HostCall::MirrorEffect { enabled });
    }

    fn set_dual_task(&mut self, enabled: bool) {
        self.log.push(HostCall::DualTask { enabled });
    }

    fn set_prism_effect(&mut self, angle: f64) {
        self.log.push(HostCall::PrismEffect { angle });
    }

    fn set_main_controller(&mut self, right_is_main: bool) {
        self.log.push(HostCall::MainController { right_is_main });
    }
}
