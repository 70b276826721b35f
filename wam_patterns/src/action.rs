use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Argument value that gets replaced by the last `RANDGEN` draw.
pub const RAND_SENTINEL: &str = "RAND";

/// One directive from a pattern file, scheduled at a given offset.
///
/// Argument values stay as the raw strings found in the file; each consumer
/// parses the types it needs when the action is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAction {
    pub function: String,
    pub arguments: BTreeMap<String, String>,
}

impl ScheduledAction {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            arguments: BTreeMap::new(),
        }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).map(String::as_str)
    }

    pub fn kind(&self) -> ActionKind {
        ActionKind::from_function(&self.function)
    }
}

impl fmt::Display for ScheduledAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self
            .arguments
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}:({})", self.function, args)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Start,
    Stop,
    Wall,
    Mole,
    Distractor,
    Difficulty,
    Modifier,
    RandGen,
    Unknown,
}

impl ActionKind {
    pub fn from_function(function: &str) -> Self {
        match function {
            "START" => ActionKind::Start,
            "STOP" => ActionKind::Stop,
            "WALL" => ActionKind::Wall,
            "MOLE" => ActionKind::Mole,
            "DISTRACTOR" => ActionKind::Distractor,
            "DIFFICULTY" => ActionKind::Difficulty,
            "MODIFIER" => ActionKind::Modifier,
            "RANDGEN" => ActionKind::RandGen,
            _ => ActionKind::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActionKind::Start => "START",
            ActionKind::Stop => "STOP",
            ActionKind::Wall => "WALL",
            ActionKind::Mole => "MOLE",
            ActionKind::Distractor => "DISTRACTOR",
            ActionKind::Difficulty => "DIFFICULTY",
            ActionKind::Modifier => "MODIFIER",
            ActionKind::RandGen => "RANDGEN",
            ActionKind::Unknown => "UNKNOWN",
        }
    }
}
