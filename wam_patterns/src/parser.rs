//! Turns pattern text into a [`Schedule`].
//!
//! Each non-comment line is `HEAD:(KEY=VALUE,...)`. `WAIT` lines move the
//! running offset forward; every other head becomes an action scheduled at
//! the running offset. A `MOLE` may carry a `STARTDELAY` that shifts only its
//! own offset, never the running one.

use std::collections::BTreeMap;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::action::{ActionKind, ScheduledAction};
use crate::schedule::Schedule;

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"//.*$").expect("comment regex"));
static ARGUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[(),]([^(),]+)").expect("argument regex"));

const WAIT_HEAD: &str = "WAIT";
const TIME_KEY: &str = "TIME";
const START_DELAY_KEY: &str = "STARTDELAY";
const LIFETIME_KEY: &str = "LIFETIME";

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum LineError {
    #[error("expected exactly one ':' separating head and arguments")]
    BadSplit,
    #[error("argument token '{token}' is not KEY=VALUE")]
    BadArgument { token: String },
    #[error("argument '{key}' is given more than once")]
    DuplicateArgument { key: String },
    #[error("missing {key} argument")]
    MissingTime { key: String },
    #[error("{key}={value} is not a non-negative number of seconds")]
    BadSeconds { key: String, value: String },
}

/// A line the parser dropped, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedLine {
    pub line_number: usize,
    pub text: String,
    pub error: LineError,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedPattern {
    pub schedule: Schedule,
    pub skipped: Vec<SkippedLine>,
}

/// Parses pattern lines, silently dropping malformed ones.
pub fn parse_pattern<I, S>(lines: I) -> Schedule
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parse_pattern_detailed(lines).schedule
}

/// Same as [`parse_pattern`] but also reports which lines were dropped.
pub fn parse_pattern_detailed<I, S>(lines: I) -> ParsedPattern
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed = ParsedPattern::default();
    let mut play_time = 0.0_f64;
    let mut mole_expiry: Option<f64> = None;

    for (idx, raw) in lines.into_iter().enumerate() {
        let raw = raw.as_ref();
        let Some(line) = normalize_line(raw) else {
            continue;
        };

        match parse_line(&line, play_time) {
            Ok(ParsedLine::Wait(seconds)) => play_time += seconds,
            Ok(ParsedLine::Action {
                offset,
                action,
                expires_at,
            }) => {
                if let Some(expiry) = expires_at {
                    mole_expiry = Some(mole_expiry.map_or(expiry, |current| current.max(expiry)));
                }
                debug!("scheduled {action} at {offset:.3}s");
                parsed.schedule.push(offset, action);
            }
            Err(error) => {
                warn!("pattern line {} skipped ({error}): {raw}", idx + 1);
                parsed.skipped.push(SkippedLine {
                    line_number: idx + 1,
                    text: raw.to_string(),
                    error,
                });
            }
        }
    }

    if let Some(expiry) = mole_expiry {
        if expiry > play_time {
            play_time = expiry;
        }
    }
    parsed.schedule.ensure_step(play_time);

    parsed
}

enum ParsedLine {
    Wait(f64),
    Action {
        offset: f64,
        action: ScheduledAction,
        expires_at: Option<f64>,
    },
}

/// Strips comments and whitespace; `None` when nothing is left.
fn normalize_line(raw: &str) -> Option<String> {
    let uncommented = COMMENT.replace(raw, "");
    let compact: String = uncommented.chars().filter(|c| !c.is_whitespace()).collect();
    (!compact.is_empty()).then_some(compact)
}

fn parse_line(line: &str, play_time: f64) -> Result<ParsedLine, LineError> {
    let mut parts = line.split(':');
    let (Some(head), Some(body), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(LineError::BadSplit);
    };

    let mut arguments = extract_arguments(body)?;

    if head == WAIT_HEAD {
        let value = arguments
            .get(TIME_KEY)
            .ok_or_else(|| LineError::MissingTime {
                key: TIME_KEY.to_string(),
            })?;
        return parse_seconds(TIME_KEY, value).map(ParsedLine::Wait);
    }

    let mut offset = play_time;
    let mut expires_at = None;
    if ActionKind::from_function(head) == ActionKind::Mole {
        if let Some(delay) = arguments.remove(START_DELAY_KEY) {
            offset += parse_seconds(START_DELAY_KEY, &delay)?;
        }
        expires_at = arguments
            .get(LIFETIME_KEY)
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|lifetime| lifetime.is_finite())
            .map(|lifetime| offset + lifetime);
    }

    Ok(ParsedLine::Action {
        offset,
        action: ScheduledAction {
            function: head.to_string(),
            arguments,
        },
        expires_at,
    })
}

fn extract_arguments(body: &str) -> Result<BTreeMap<String, String>, LineError> {
    let mut arguments = BTreeMap::new();
    for capture in ARGUMENT.captures_iter(body) {
        let token = &capture[1];
        let Some((key, value)) = token.split_once('=') else {
            return Err(LineError::BadArgument {
                token: token.to_string(),
            });
        };
        if key.is_empty() || value.contains('=') {
            return Err(LineError::BadArgument {
                token: token.to_string(),
            });
        }
        if arguments
            .insert(key.to_string(), value.to_string())
            .is_some()
        {
            return Err(LineError::DuplicateArgument {
                key: key.to_string(),
            });
        }
    }
    Ok(arguments)
}

fn parse_seconds(key: &str, value: &str) -> Result<f64, LineError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .ok_or_else(|| LineError::BadSeconds {
            key: key.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::{parse_pattern, parse_pattern_detailed, LineError};

    fn functions_at(schedule: &crate::Schedule, offset: f64) -> Vec<String> {
        schedule
            .actions_at(offset)
            .unwrap_or_else(|| panic!("no step at {offset}"))
            .iter()
            .map(|action| action.function.clone())
            .collect()
    }

    #[test]
    fn two_moles_around_a_wait() {
        let schedule = parse_pattern([
            "MOLE:(X=1,Y=2,LIFETIME=2.0)",
            "WAIT:(TIME=1.5)",
            "MOLE:(X=3,Y=4,LIFETIME=1.0)",
        ]);

        assert_eq!(schedule.offsets(), vec![0.0, 1.5, 2.5]);
        let first = &schedule.actions_at(0.0).expect("first mole")[0];
        assert_eq!(first.argument("X"), Some("1"));
        assert_eq!(first.argument("Y"), Some("2"));
        assert_eq!(first.argument("LIFETIME"), Some("2.0"));
        assert_eq!(functions_at(&schedule, 1.5), vec!["MOLE"]);
        assert!(schedule.actions_at(2.5).expect("terminal").is_empty());
        assert_eq!(schedule.duration(), Some(2.5));
    }

    #[test]
    fn consecutive_waits_accumulate() {
        let schedule = parse_pattern([
            "WAIT:(TIME=0.5)",
            "WAIT:(TIME=1.25)",
            "WAIT:(TIME=2)",
            "START:()",
        ]);
        assert_eq!(schedule.offsets(), vec![3.75]);
        assert_eq!(functions_at(&schedule, 3.75), vec!["START"]);
    }

    #[test]
    fn start_delay_shifts_only_its_own_mole() {
        let schedule = parse_pattern([
            "WAIT:(TIME=1)",
            "MOLE:(X=2,Y=3,LIFETIME=0.5,STARTDELAY=0.25)",
            "WAIT:(TIME=1)",
            "DISTRACTOR:(X=1,Y=1,LIFETIME=1)",
        ]);

        let delayed = &schedule.actions_at(1.25).expect("delayed mole")[0];
        assert_eq!(delayed.function, "MOLE");
        assert!(delayed.argument("STARTDELAY").is_none());
        assert_eq!(functions_at(&schedule, 2.0), vec!["DISTRACTOR"]);
        assert!(schedule.actions_at(1.0).is_none());
    }

    #[test]
    fn trailing_wait_sets_duration_when_longer_than_moles() {
        let schedule = parse_pattern(["MOLE:(X=1,Y=1,LIFETIME=1)", "WAIT:(TIME=4)"]);
        assert_eq!(schedule.duration(), Some(4.0));
    }

    #[test]
    fn longest_mole_defines_duration() {
        let schedule = parse_pattern([
            "MOLE:(X=1,Y=1,LIFETIME=5)",
            "WAIT:(TIME=1)",
            "MOLE:(X=2,Y=2,LIFETIME=1)",
        ]);
        assert_eq!(schedule.duration(), Some(5.0));
    }

    #[test]
    fn actions_at_same_offset_keep_source_order() {
        let schedule = parse_pattern([
            "DIFFICULTY:(SPEED=Fast)",
            "MODIFIER:(MIRROR=true)",
            "START:()",
        ]);
        assert_eq!(
            functions_at(&schedule, 0.0),
            vec!["DIFFICULTY", "MODIFIER", "START"]
        );
    }

    #[test]
    fn comments_blank_lines_and_whitespace_are_ignored() {
        let schedule = parse_pattern([
            "",
            "// warm-up block",
            "   ",
            "MOLE : ( X = 1 , Y = 2 , LIFETIME = 1.5 ) // first target\r",
        ]);
        let mole = &schedule.actions_at(0.0).expect("mole")[0];
        assert_eq!(mole.argument("X"), Some("1"));
        assert_eq!(mole.argument("LIFETIME"), Some("1.5"));
        assert_eq!(schedule.duration(), Some(1.5));
    }

    #[test]
    fn malformed_lines_are_reported_and_skipped() {
        let parsed = parse_pattern_detailed([
            "START",
            "MOLE:(X=1):(Y=2)",
            "WAIT:(TIME=abc)",
            "WAIT:()",
            "MOLE:(X,Y=1)",
            "MODIFIER:(MIRROR=true,MIRROR=false)",
            "MOLE:(X=1,Y=1,LIFETIME=1,STARTDELAY=-1)",
            "STOP:()",
        ]);

        let errors: Vec<_> = parsed
            .skipped
            .iter()
            .map(|skipped| (skipped.line_number, skipped.error.clone()))
            .collect();
        assert_eq!(errors.len(), 7);
        assert_eq!(errors[0], (1, LineError::BadSplit));
        assert_eq!(errors[1], (2, LineError::BadSplit));
        assert!(matches!(errors[2].1, LineError::BadSeconds { .. }));
        assert!(matches!(errors[3].1, LineError::MissingTime { .. }));
        assert!(matches!(errors[4].1, LineError::BadArgument { .. }));
        assert!(matches!(errors[5].1, LineError::DuplicateArgument { .. }));
        assert!(matches!(errors[6].1, LineError::BadSeconds { .. }));

        assert_eq!(parsed.schedule.offsets(), vec![0.0]);
        assert_eq!(functions_at(&parsed.schedule, 0.0), vec!["STOP"]);
    }

    #[test]
    fn argument_values_are_not_type_checked() {
        let schedule = parse_pattern(["MOLE:(X=left,Y=RAND,LIFETIME=soon)"]);
        let mole = &schedule.actions_at(0.0).expect("mole")[0];
        assert_eq!(mole.argument("X"), Some("left"));
        assert_eq!(mole.argument("Y"), Some("RAND"));
        assert_eq!(schedule.len(), 1);
    }

    #[test]
    fn missing_closing_parenthesis_is_tolerated() {
        let schedule = parse_pattern(["MOLE:(X=1,Y=2,LIFETIME=1", "WAIT:(TIME=1.5"]);
        let mole = &schedule.actions_at(0.0).expect("mole")[0];
        assert_eq!(mole.argument("X"), Some("1"));
        assert_eq!(mole.argument("LIFETIME"), Some("1"));
        assert_eq!(schedule.duration(), Some(1.5));
    }

    #[test]
    fn empty_input_still_has_terminal_step() {
        let schedule = parse_pattern(Vec::<String>::new());
        assert_eq!(schedule.offsets(), vec![0.0]);
        assert_eq!(schedule.action_count(), 0);
    }

    #[test]
    fn parsing_is_idempotent() {
        let lines = [
            "WALL:(ROW=5,COL=7)",
            "WAIT:(TIME=0.3)",
            "MOLE:(X=1,Y=1,LIFETIME=2,STARTDELAY=0.1)",
            "WAIT:(TIME=0.2)",
            "RANDGEN:(STARTVALUE=0,ENDVALUE=4,ISINT=true)",
        ];
        assert_eq!(parse_pattern(lines), parse_pattern(lines));
    }

    #[test]
    fn empty_argument_list_produces_bare_action() {
        let schedule = parse_pattern(["START:()", "WAIT:(TIME=1)", "STOP:()"]);
        let start = &schedule.actions_at(0.0).expect("start")[0];
        assert!(start.arguments.is_empty());
        assert_eq!(schedule.duration(), Some(1.0));
    }
}
