use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Headless host for whack-a-mole session patterns and patient profiles",
    version
)]
pub struct Args {
    /// Optional JSON storage config (data root, folder names, extensions)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the pattern and profile folders (overrides --config)
    #[arg(long)]
    pub data_root: Option<PathBuf>,

    /// List the available patterns
    #[arg(long)]
    pub list: bool,

    /// Parse a pattern and print its schedule
    #[arg(long, value_name = "NAME")]
    pub inspect: Option<String>,

    /// Path to write the parsed schedule as JSON (requires --inspect)
    #[arg(long)]
    pub schedule_json: Option<PathBuf>,

    /// Play a pattern through a simulated frame loop
    #[arg(long, value_name = "NAME")]
    pub play: Option<String>,

    /// Frame duration in seconds used by --play
    #[arg(long, default_value_t = 1.0 / 60.0)]
    pub tick: f64,

    /// Seed for RANDGEN draws (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Pause playback once this many seconds have elapsed (requires --play)
    #[arg(long)]
    pub pause_at: Option<f64>,

    /// How long the pause lasts, in seconds
    #[arg(long, default_value_t = 0.0)]
    pub pause_for: f64,

    /// Path to write the timed collaborator call log as JSON (requires --play)
    #[arg(long)]
    pub call_log_json: Option<PathBuf>,

    /// List the stored patient profiles
    #[arg(long)]
    pub list_profiles: bool,

    /// Create a profile with this name (requires --mail)
    #[arg(long, value_name = "NAME")]
    pub create_profile: Option<String>,

    /// Mail address for --create-profile
    #[arg(long)]
    pub mail: Option<String>,

    /// Extra KEY=VALUE property for --create-profile (repeatable)
    #[arg(long = "property", value_name = "KEY=VALUE")]
    pub properties: Vec<String>,

    /// Delete the profile with this id
    #[arg(long, value_name = "ID")]
    pub delete_profile: Option<String>,
}

#[derive(Debug)]
pub enum Command {
    List,
    Inspect(InspectArgs),
    Play(PlayArgs),
    ListProfiles,
    CreateProfile(CreateProfileArgs),
    DeleteProfile { id: String },
}

#[derive(Debug)]
pub struct InspectArgs {
    pub name: String,
    pub schedule_json: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PlayArgs {
    pub name: String,
    pub tick: f64,
    pub seed: Option<u64>,
    pub pause_at: Option<f64>,
    pub pause_for: f64,
    pub call_log_json: Option<PathBuf>,
}

#[derive(Debug)]
pub struct CreateProfileArgs {
    pub name: String,
    pub mail: String,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct Invocation {
    pub config: Option<PathBuf>,
    pub data_root: Option<PathBuf>,
    pub command: Command,
}

pub fn parse() -> Result<Invocation> {
    let args = Args::parse();
    args.into_invocation()
}

impl Args {
    fn into_invocation(self) -> Result<Invocation> {
        let selected = [
            self.list,
            self.inspect.is_some(),
            self.play.is_some(),
            self.list_profiles,
            self.create_profile.is_some(),
            self.delete_profile.is_some(),
        ]
        .iter()
        .filter(|flag| **flag)
        .count();
        if selected != 1 {
            bail!(
                "choose exactly one of --list, --inspect, --play, --list-profiles, \
                 --create-profile, --delete-profile"
            );
        }
        if self.schedule_json.is_some() && self.inspect.is_none() {
            bail!("--schedule-json requires --inspect");
        }
        if self.play.is_none() && (self.pause_at.is_some() || self.call_log_json.is_some()) {
            bail!("--pause-at and --call-log-json require --play");
        }
        if self.create_profile.is_none() && (self.mail.is_some() || !self.properties.is_empty()) {
            bail!("--mail and --property require --create-profile");
        }

        let command = if self.list {
            Command::List
        } else if let Some(name) = self.inspect {
            Command::Inspect(InspectArgs {
                name,
                schedule_json: self.schedule_json,
            })
        } else if let Some(name) = self.play {
            if !self.tick.is_finite() || self.tick <= 0.0 {
                bail!("--tick must be a positive number of seconds (got {})", self.tick);
            }
            if !self.pause_for.is_finite() || self.pause_for < 0.0 {
                bail!("--pause-for must not be negative (got {})", self.pause_for);
            }
            Command::Play(PlayArgs {
                name,
                tick: self.tick,
                seed: self.seed,
                pause_at: self.pause_at,
                pause_for: self.pause_for,
                call_log_json: self.call_log_json,
            })
        } else if self.list_profiles {
            Command::ListProfiles
        } else if let Some(name) = self.create_profile {
            let mail = self
                .mail
                .context("--create-profile requires --mail")?;
            Command::CreateProfile(CreateProfileArgs {
                name,
                mail,
                properties: parse_properties(&self.properties)?,
            })
        } else if let Some(id) = self.delete_profile {
            Command::DeleteProfile { id }
        } else {
            unreachable!("exactly one command flag was checked above");
        };

        Ok(Invocation {
            config: self.config,
            data_root: self.data_root,
            command,
        })
    }
}

fn parse_properties(raw: &[String]) -> Result<BTreeMap<String, String>> {
    let mut properties = BTreeMap::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("--property expects KEY=VALUE (got {entry})");
        };
        properties.insert(key.to_string(), value.to_string());
    }
    Ok(properties)
}
