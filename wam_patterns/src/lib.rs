//! Scripted whack-a-mole session patterns.
//!
//! Pattern files are parsed into a [`Schedule`], which a [`PatternPlayer`]
//! plays back one host frame at a time, handing each due action to an
//! [`ActionDispatcher`] that drives the wall, game and modifier subsystems.

pub mod action;
pub mod config;
pub mod dispatcher;
pub mod host;
pub mod manager;
pub mod modifiers;
pub mod parser;
pub mod player;
pub mod profiles;
pub mod recorder;
pub mod schedule;
pub mod store;

pub use action::{ActionKind, ScheduledAction, RAND_SENTINEL};
pub use config::StorageConfig;
pub use dispatcher::{ActionDispatcher, DispatchError, RandomVariable};
pub use host::{EyePatch, GameControl, ModifierControl, WallControl};
pub use manager::{PatternEvent, PatternManager};
pub use modifiers::{ModifierSnapshot, ModifierState, ModifierUpdate};
pub use parser::{parse_pattern, parse_pattern_detailed, LineError, ParsedPattern, SkippedLine};
pub use player::{PatternPlayer, PlaybackStats, PlayerState};
pub use profiles::{Profile, ProfileManager, ProfileStore, ProfileSummary};
pub use recorder::{CallLog, HostCall, RecordingGame, RecordingModifiers, RecordingWall};
pub use schedule::{Schedule, ScheduleStep};
pub use store::{LoadError, PatternStore};
