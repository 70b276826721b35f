use std::str::FromStr;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::action::{ActionKind, ScheduledAction, RAND_SENTINEL};
use crate::host::{EyePatch, GameControl, ModifierControl, WallControl};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("{function} requires argument {key}")]
    MissingArgument { function: String, key: String },
    #[error("{function}: {key}={value} is not a valid {expected}")]
    InvalidValue {
        function: String,
        key: String,
        value: String,
        expected: &'static str,
    },
    #[error("unknown pattern function '{0}'")]
    UnknownFunction(String),
}

/// The scalar that `RANDGEN` regenerates and `RAND` arguments read.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RandomVariable {
    value: f64,
}

impl RandomVariable {
    pub fn value(self) -> f64 {
        self.value
    }

    /// Draws a new value uniformly in the closed range spanned by the bounds.
    ///
    /// Returns `false` and keeps the current value when the bounds are not
    /// finite or their span overflows an `f64`.
    pub fn regenerate<R: Rng>(
        &mut self,
        rng: &mut R,
        start: f64,
        end: f64,
        is_int: bool,
    ) -> bool {
        let (low, high) = if start <= end { (start, end) } else { (end, start) };
        if !(high - low).is_finite() {
            return false;
        }
        let mut value = if low == high {
            low
        } else {
            rng.gen_range(low..=high)
        };
        if is_int {
            value = value.round();
        }
        self.value = value;
        true
    }

    pub fn render(self) -> String {
        self.value.to_string()
    }
}

/// Executes scheduled actions against the game collaborators.
pub struct ActionDispatcher {
    wall: Box<dyn WallControl>,
    game: Box<dyn GameControl>,
    modifiers: Box<dyn ModifierControl>,
    random: RandomVariable,
    rng: StdRng,
}

impl ActionDispatcher {
    pub fn new(
        wall: Box<dyn WallControl>,
        game: Box<dyn GameControl>,
        modifiers: Box<dyn ModifierControl>,
    ) -> Self {
        Self::with_rng(wall, game, modifiers, StdRng::from_entropy())
    }

    pub fn with_seed(
        wall: Box<dyn WallControl>,
        game: Box<dyn GameControl>,
        modifiers: Box<dyn ModifierControl>,
        seed: u64,
    ) -> Self {
        Self::with_rng(wall, game, modifiers, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        wall: Box<dyn WallControl>,
        game: Box<dyn GameControl>,
        modifiers: Box<dyn ModifierControl>,
        rng: StdRng,
    ) -> Self {
        Self {
            wall,
            game,
            modifiers,
            random: RandomVariable::default(),
            rng,
        }
    }

    pub fn random_value(&self) -> f64 {
        self.random.value()
    }

    /// Runs one action. Errors leave earlier sub-steps applied and never
    /// affect later actions.
    pub fn dispatch(&mut self, action: &ScheduledAction) -> Result<(), DispatchError> {
        let action = self.substitute_random(action);
        debug!("dispatching {action}");
        let args = Args::new(&action);

        match action.kind() {
            ActionKind::Start => self.game.start_game(),
            ActionKind::Stop => self.game.stop_game(),
            ActionKind::Wall => self.apply_wall(&args)?,
            ActionKind::Mole => self.activate_mole(&args, false)?,
            ActionKind::Distractor => self.activate_mole(&args, true)?,
            ActionKind::Difficulty => {
                let speed = args.required("SPEED")?;
                self.game.set_difficulty(speed);
            }
            ActionKind::Modifier => self.apply_modifiers(&args)?,
            ActionKind::RandGen => {
                let start = args.finite_required("STARTVALUE")?;
                let end = args.finite_required("ENDVALUE")?;
                let is_int = args.bool_required("ISINT")?;
                if !self.random.regenerate(&mut self.rng, start, end, is_int) {
                    return Err(args.invalid(
                        "ENDVALUE",
                        &format!("{end} (from {start})"),
                        "range with a finite span",
                    ));
                }
                debug!("random variable regenerated to {}", self.random.render());
            }
            ActionKind::Unknown => {
                return Err(DispatchError::UnknownFunction(action.function.clone()))
            }
        }
        Ok(())
    }

    fn substitute_random(&self, action: &ScheduledAction) -> ScheduledAction {
        let mut action = action.clone();
        let rendered = self.random.render();
        for value in action.arguments.values_mut() {
            if value.as_str() == RAND_SENTINEL {
                *value = rendered.clone();
            }
        }
        action
    }

    fn apply_wall(&mut self, args: &Args<'_>) -> Result<(), DispatchError> {
        let wall = self.wall.as_mut();
        wall.clear();

        if let Some(rows) = args.parse_optional::<i32>("ROW", "integer")? {
            wall.set_row_count(rows);
        }
        if let Some(columns) = args.parse_optional::<i32>("COL", "integer")? {
            wall.set_column_count(columns);
        }
        for key in FLOAT_WALL_SETTINGS {
            if let Some(value) = args.finite_optional(key)? {
                apply_wall_setting(wall, key, value);
            }
        }

        wall.enable();
        Ok(())
    }

    fn activate_mole(&mut self, args: &Args<'_>, is_fake: bool) -> Result<(), DispatchError> {
        let x: i32 = args.parse_required("X", "integer")?;
        let y: i32 = args.parse_required("Y", "integer")?;
        let lifetime = args.finite_required("LIFETIME")?;
        let id = x
            .checked_mul(100)
            .and_then(|scaled| scaled.checked_add(y))
            .ok_or_else(|| args.invalid("X", &format!("{x} (Y={y})"), "mole coordinate"))?;
        let expiring = self.game.mole_expiring_duration();
        self.wall.activate_mole(id, lifetime, expiring, is_fake);
        Ok(())
    }

    fn apply_modifiers(&mut self, args: &Args<'_>) -> Result<(), DispatchError> {
        let modifiers = self.modifiers.as_mut();
        if let Some(side) = args.parse_optional::<EyePatch>("EYEPATCH", "eye patch side")? {
            modifiers.set_eye_patch(side);
        }
        if let Some(enabled) = args.bool_optional("MIRROR")? {
            modifiers.set_mirror_effect(enabled);
        }
        if let Some(enabled) = args.bool_optional("DUALTASK")? {
            modifiers.set_dual_task(enabled);
        }
        if let Some(angle) = args.finite_optional("PRISMEFFECT")? {
            modifiers.set_prism_effect(angle);
        }
        if let Some(right_is_main) = args.bool_optional("MAINCONTROLLER")? {
            modifiers.set_main_controller(right_is_main);
        }
        Ok(())
    }
}

const FLOAT_WALL_SETTINGS: [&str; 9] = [
    "SIZEX",
    "SIZEY",
    "SIZEZ",
    "CURVEX",
    "CURVEY",
    "MAXANGLE",
    "MOLESCALEX",
    "MOLESCALEY",
    "MOLESCALEZ",
];

fn apply_wall_setting(wall: &mut dyn WallControl, key: &str, value: f64) {
    match key {
        "SIZEX" => wall.set_size_x(value),
        "SIZEY" => wall.set_size_y(value),
        "SIZEZ" => wall.set_size_z(value),
        "CURVEX" => wall.set_curve_x(value),
        "CURVEY" => wall.set_curve_y(value),
        "MAXANGLE" => wall.set_max_angle(value),
        "MOLESCALEX" => wall.set_mole_scale_x(value),
        "MOLESCALEY" => wall.set_mole_scale_y(value),
        "MOLESCALEZ" => wall.set_mole_scale_z(value),
        _ => {}
    }
}

/// Typed accessors over an action's raw arguments.
struct Args<'a> {
    action: &'a ScheduledAction,
}

impl<'a> Args<'a> {
    fn new(action: &'a ScheduledAction) -> Self {
        Self { action }
    }

    fn required(&self, key: &str) -> Result<&'a str, DispatchError> {
        self.action
            .argument(key)
            .ok_or_else(|| DispatchError::MissingArgument {
                function: self.action.function.clone(),
                key: key.to_string(),
            })
    }

    fn invalid(&self, key: &str, value: &str, expected: &'static str) -> DispatchError {
        DispatchError::InvalidValue {
            function: self.action.function.clone(),
            key: key.to_string(),
            value: value.to_string(),
            expected,
        }
    }

    fn parse_value<T: FromStr>(
        &self,
        key: &str,
        value: &str,
        expected: &'static str,
    ) -> Result<T, DispatchError> {
        value
            .parse::<T>()
            .map_err(|_| self.invalid(key, value, expected))
    }

    fn parse_required<T: FromStr>(
        &self,
        key: &str,
        expected: &'static str,
    ) -> Result<T, DispatchError> {
        let value = self.required(key)?;
        self.parse_value(key, value, expected)
    }

    fn parse_optional<T: FromStr>(
        &self,
        key: &str,
        expected: &'static str,
    ) -> Result<Option<T>, DispatchError> {
        self.action
            .argument(key)
            .map(|value| self.parse_value(key, value, expected))
            .transpose()
    }

    fn finite_value(&self, key: &str, value: &str) -> Result<f64, DispatchError> {
        value
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .ok_or_else(|| self.invalid(key, value, "finite number"))
    }

    fn finite_required(&self, key: &str) -> Result<f64, DispatchError> {
        let value = self.required(key)?;
        self.finite_value(key, value)
    }

    fn finite_optional(&self, key: &str) -> Result<Option<f64>, DispatchError> {
        self.action
            .argument(key)
            .map(|value| self.finite_value(key, value))
            .transpose()
    }

    fn bool_value(&self, key: &str, value: &str) -> Result<bool, DispatchError> {
        parse_bool(value).ok_or_else(|| self.invalid(key, value, "boolean"))
    }

    fn bool_required(&self, key: &str) -> Result<bool, DispatchError> {
        let value = self.required(key)?;
        self.bool_value(key, value)
    }

    fn bool_optional(&self, key: &str) -> Result<Option<bool>, DispatchError> {
        self.action
            .argument(key)
            .map(|value| self.bool_value(key, value))
            .transpose()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
