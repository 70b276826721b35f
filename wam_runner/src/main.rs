use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use wam_patterns::{
    parse_pattern_detailed, PatternStore, ProfileManager, ProfileStore, StorageConfig,
};

mod cli;
mod session;

use cli::{Command, CreateProfileArgs, InspectArgs, PlayArgs};
use session::{describe_call, run_session};

fn main() -> Result<()> {
    env_logger::init();
    let invocation = cli::parse()?;

    let mut config = StorageConfig::from_json_file(invocation.config.as_deref())
        .context("loading storage config")?;
    if let Some(data_root) = invocation.data_root {
        config.data_root = data_root;
    }

    match invocation.command {
        Command::List => list_patterns(&config),
        Command::Inspect(args) => inspect_pattern(&config, &args),
        Command::Play(args) => play_pattern(&config, &args),
        Command::ListProfiles => list_profiles(&config),
        Command::CreateProfile(args) => create_profile(&config, &args),
        Command::DeleteProfile { id } => delete_profile(&config, &id),
    }
}

fn open_patterns(config: &StorageConfig) -> Result<PatternStore> {
    PatternStore::open(config.pattern_root(), config.pattern_extension.clone())
        .context("opening pattern store")
}

fn open_profiles(config: &StorageConfig) -> Result<ProfileManager> {
    let store = ProfileStore::open(config.profile_root(), config.profile_extension.clone())
        .context("opening profile store")?;
    Ok(ProfileManager::new(store))
}

fn list_patterns(config: &StorageConfig) -> Result<()> {
    let store = open_patterns(config)?;
    let names = store.list_patterns()?;
    if names.is_empty() {
        println!("No patterns in {}", store.root().display());
        return Ok(());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn inspect_pattern(config: &StorageConfig, args: &InspectArgs) -> Result<()> {
    let store = open_patterns(config)?;
    let lines = store
        .load_pattern(&args.name)
        .with_context(|| format!("loading pattern {}", args.name))?;
    let parsed = parse_pattern_detailed(&lines);
    let schedule = &parsed.schedule;

    println!(
        "Pattern {}: {} steps, {} actions, duration {:.3}s",
        args.name,
        schedule.len(),
        schedule.action_count(),
        schedule.duration().unwrap_or_default()
    );
    for step in schedule.steps() {
        if step.actions.is_empty() {
            println!("  {:>8.3}s  (end)", step.offset);
            continue;
        }
        for action in &step.actions {
            println!("  {:>8.3}s  {action}", step.offset);
        }
    }
    for skipped in &parsed.skipped {
        println!(
            "  skipped line {}: {} ({})",
            skipped.line_number, skipped.text, skipped.error
        );
    }

    if let Some(path) = &args.schedule_json {
        let json = schedule
            .to_json_string()
            .context("serializing schedule")?;
        write_output(path, &json)?;
        println!("Schedule written to {}", path.display());
    }
    Ok(())
}

fn play_pattern(config: &StorageConfig, args: &PlayArgs) -> Result<()> {
    let store = open_patterns(config)?;
    let report = run_session(store, args)?;

    for timed in &report.calls {
        println!("[{:>8.3}s] {}", timed.time, describe_call(&timed.call));
    }
    println!(
        "Played {} in {} frames ({:.3}s): {} steps, {} actions, {} failed",
        report.pattern,
        report.frames,
        report.elapsed,
        report.stats.steps_fired,
        report.stats.actions_dispatched,
        report.stats.actions_failed
    );

    if let Some(path) = &args.call_log_json {
        let json = serde_json::to_string_pretty(&report).context("serializing call log")?;
        write_output(path, &json)?;
        println!("Call log written to {}", path.display());
    }
    Ok(())
}

fn list_profiles(config: &StorageConfig) -> Result<()> {
    let manager = open_profiles(config)?;
    let summaries = manager.profile_summaries();
    if summaries.is_empty() {
        println!("No profiles in {}", manager.store().root().display());
        return Ok(());
    }
    for summary in summaries {
        println!("{}  {}", summary.id, summary.name);
    }
    Ok(())
}

fn create_profile(config: &StorageConfig, args: &CreateProfileArgs) -> Result<()> {
    let mut manager = open_profiles(config)?;
    let id = manager
        .create_profile(&args.name, &args.mail, &args.properties)
        .with_context(|| format!("creating profile {}", args.name))?;
    println!("{id}");
    Ok(())
}

fn delete_profile(config: &StorageConfig, id: &str) -> Result<()> {
    let mut manager = open_profiles(config)?;
    if !manager.add_for_deletion(id) {
        bail!("no profile with id {id}");
    }
    let deleted = manager.confirm_deletion();
    if deleted.is_empty() {
        bail!("profile {id} could not be deleted");
    }
    println!("Deleted {} profile(s)", deleted.len());
    Ok(())
}

fn write_output(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}
