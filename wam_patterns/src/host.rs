//! Interfaces of the game subsystems a pattern drives.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wall of mole spawn points.
pub trait WallControl {
    fn clear(&mut self);
    fn enable(&mut self);
    fn set_row_count(&mut self, rows: i32);
    fn set_column_count(&mut self, columns: i32);
    fn set_size_x(&mut self, value: f64);
    fn set_size_y(&mut self, value: f64);
    fn set_size_z(&mut self, value: f64);
    fn set_curve_x(&mut self, value: f64);
    fn set_curve_y(&mut self, value: f64);
    fn set_max_angle(&mut self, value: f64);
    fn set_mole_scale_x(&mut self, value: f64);
    fn set_mole_scale_y(&mut self, value: f64);
    fn set_mole_scale_z(&mut self, value: f64);
    fn activate_mole(&mut self, id: i32, lifetime: f64, expiring_duration: f64, is_fake: bool);
}

/// Session-level game state.
pub trait GameControl {
    fn start_game(&mut self);
    fn stop_game(&mut self);
    fn set_difficulty(&mut self, difficulty: &str);
    fn mole_expiring_duration(&self) -> f64;
}

/// Perceptual and motor manipulations applied to the player.
pub trait ModifierControl {
    fn set_eye_patch(&mut self, eye_patch: EyePatch);
    fn set_mirror_effect(&mut self, enabled: bool);
    fn set_dual_task(&mut self, enabled: bool);
    fn set_prism_effect(&mut self, angle: f64);
    fn set_main_controller(&mut self, right_is_main: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EyePatch {
    Left,
    #[default]
    None,
    Right,
}

impl EyePatch {
    pub fn as_str(self) -> &'static str {
        match self {
            EyePatch::Left => "Left",
            EyePatch::None => "None",
            EyePatch::Right => "Right",
        }
    }
}

impl fmt::Display for EyePatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not an eye patch side (expected Left, None or Right)")]
pub struct EyePatchParseError(pub String);

impl FromStr for EyePatch {
    type Err = EyePatchParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Left" => Ok(EyePatch::Left),
            "None" => Ok(EyePatch::None),
            "Right" => Ok(EyePatch::Right),
            other => Err(EyePatchParseError(other.to_string())),
        }
    }
}
