use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use anyhow::{Context, Result};
use serde_json::Value;
use tempfile::tempdir;

const SESSION: &str = "\
// warmup session
START:()
DIFFICULTY:(SPEED=Slow)
WALL:(ROW=3,COL=4,SIZEX=2.5)
WAIT:(TIME=0.5)
MOLE:(X=1,Y=2,LIFETIME=2.0)
WAIT:(TIME=1.5)
MOLE:(X=3,Y=4,LIFETIME=1.0)
STOP:()
";

fn runner(data_root: &Path, args: &[&str]) -> Result<Output> {
    let data_root = data_root
        .to_str()
        .context("data root path is not valid UTF-8")?;
    Command::new(env!("CARGO_BIN_EXE_wam_runner"))
        .arg("--data-root")
        .arg(data_root)
        .args(args)
        .output()
        .context("executing wam_runner")
}

fn write_pattern(data_root: &Path, name: &str, contents: &str) -> Result<()> {
    let dir = data_root.join("TestPatterns");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(format!("{name}.wampat")), contents)?;
    Ok(())
}

#[test]
fn lists_patterns_sorted_by_name() -> Result<()> {
    let temp = tempdir()?;
    write_pattern(temp.path(), "zeta", "START:()\n")?;
    write_pattern(temp.path(), "alpha", "START:()\n")?;
    fs::write(temp.path().join("TestPatterns").join("notes.txt"), "x")?;

    let output = runner(temp.path(), &["--list"])?;
    assert!(output.status.success(), "wam_runner exited with {:?}", output.status);
    let stdout = String::from_utf8(output.stdout)?;
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["alpha", "zeta"]);
    Ok(())
}

#[test]
fn inspect_exports_schedule_json() -> Result<()> {
    let temp = tempdir()?;
    write_pattern(temp.path(), "warmup", SESSION)?;
    let json_path = temp.path().join("out").join("schedule.json");
    let json_arg = json_path.to_str().context("schedule path is not valid UTF-8")?;

    let output = runner(
        temp.path(),
        &["--inspect", "warmup", "--schedule-json", json_arg],
    )?;
    assert!(output.status.success(), "wam_runner exited with {:?}", output.status);

    let schedule: Value = serde_json::from_str(&fs::read_to_string(&json_path)?)?;
    let offsets: Vec<f64> = schedule["steps"]
        .as_array()
        .context("steps array")?
        .iter()
        .filter_map(|step| step["offset"].as_f64())
        .collect();
    assert_eq!(offsets, vec![0.0, 0.5, 2.0, 3.0]);
    assert_eq!(schedule["steps"][0]["actions"][0]["function"], "START");
    assert_eq!(schedule["steps"][1]["actions"][0]["arguments"]["LIFETIME"], "2.0");
    Ok(())
}

#[test]
fn play_writes_timed_call_log() -> Result<()> {
    let temp = tempdir()?;
    write_pattern(temp.path(), "warmup", SESSION)?;
    let log_path = temp.path().join("calls.json");
    let log_arg = log_path.to_str().context("call log path is not valid UTF-8")?;

    let output = runner(
        temp.path(),
        &[
            "--play",
            "warmup",
            "--tick",
            "0.25",
            "--seed",
            "1",
            "--call-log-json",
            log_arg,
        ],
    )?;
    assert!(output.status.success(), "wam_runner exited with {:?}", output.status);
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("mole 102"), "missing mole activation in {stdout}");

    let report: Value = serde_json::from_str(&fs::read_to_string(&log_path)?)?;
    assert_eq!(report["pattern"], "warmup");
    assert_eq!(report["duration"], 3.0);
    assert_eq!(report["stats"]["actions_failed"], 0);

    let calls = report["calls"].as_array().context("calls array")?;
    let kinds: Vec<&str> = calls
        .iter()
        .filter_map(|call| call["kind"].as_str())
        .collect();
    assert_eq!(kinds.first(), Some(&"start_game"));
    assert_eq!(kinds.last(), Some(&"stop_game"));
    assert!(kinds.contains(&"wall_enable"));

    let moles: Vec<(f64, i64)> = calls
        .iter()
        .filter(|call| call["kind"] == "activate_mole")
        .filter_map(|call| Some((call["time"].as_f64()?, call["id"].as_i64()?)))
        .collect();
    assert_eq!(moles, vec![(0.5, 102), (2.0, 304)]);
    Ok(())
}

#[test]
fn missing_pattern_fails() -> Result<()> {
    let temp = tempdir()?;
    let output = runner(temp.path(), &["--play", "nowhere"])?;
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("nowhere"), "unexpected stderr: {stderr}");
    Ok(())
}

#[test]
fn profiles_can_be_created_listed_and_deleted() -> Result<()> {
    let temp = tempdir()?;
    let output = runner(
        temp.path(),
        &[
            "--create-profile",
            "Ada",
            "--mail",
            "ada@example.org",
            "--property",
            "Handedness=Left",
        ],
    )?;
    assert!(output.status.success(), "wam_runner exited with {:?}", output.status);
    let id = String::from_utf8(output.stdout)?.trim().to_string();
    assert_eq!(id.len(), 32);

    let profile_path = temp
        .path()
        .join("UserProfiles")
        .join(format!("{id}.uprofile"));
    assert_eq!(
        fs::read_to_string(&profile_path)?,
        "Name:Ada\nMail:ada@example.org\nHandedness:Left\n"
    );

    let listed = runner(temp.path(), &["--list-profiles"])?;
    assert!(listed.status.success());
    assert!(String::from_utf8(listed.stdout)?.contains(&format!("{id}  Ada")));

    let deleted = runner(temp.path(), &["--delete-profile", &id])?;
    assert!(deleted.status.success());
    assert!(!profile_path.exists());

    let again = runner(temp.path(), &["--delete-profile", &id])?;
    assert!(!again.status.success());
    Ok(())
}
