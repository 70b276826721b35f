//! Patient profiles stored as `key:value` text files, one file per profile.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use chrono::Local;
use log::{info, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

pub const DEFAULT_PROFILE_EXTENSION: &str = "uprofile";

const NAME_KEY: &str = "Name";
const MAIL_KEY: &str = "Mail";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: String,
    pub properties: BTreeMap<String, String>,
}

impl Profile {
    pub fn name(&self) -> Option<&str> {
        self.properties.get(NAME_KEY).map(String::as_str)
    }

    pub fn mail(&self) -> Option<&str> {
        self.properties.get(MAIL_KEY).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub id: String,
    pub name: String,
}

/// Every profile found in the profile directory, loaded eagerly on open.
#[derive(Debug)]
pub struct ProfileStore {
    root: PathBuf,
    extension: String,
    profiles: BTreeMap<String, Profile>,
}

impl ProfileStore {
    pub fn open(root: impl Into<PathBuf>, extension: impl Into<String>) -> Result<Self> {
        let root = root.into();
        let extension = extension.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating profile directory {}", root.display()))?;

        let mut profiles = BTreeMap::new();
        for entry in WalkDir::new(&root).min_depth(1).max_depth(1) {
            let entry = entry.with_context(|| format!("listing profiles in {}", root.display()))?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(extension.as_str())
            {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let properties = match read_profile_file(path) {
                Ok(properties) => properties,
                Err(err) => {
                    warn!("skipping profile file {}: {err:#}", path.display());
                    continue;
                }
            };
            profiles.insert(
                id.to_string(),
                Profile {
                    id: id.to_string(),
                    properties,
                },
            );
        }

        Ok(Self {
            root,
            extension,
            profiles,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has_profile(&self, id: &str) -> bool {
        self.profiles.contains_key(id)
    }

    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.get(id)
    }

    pub fn profiles(&self) -> impl ExactSizeIterator<Item = &Profile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Writes a new profile file and returns its generated id.
    pub fn create_profile(
        &mut self,
        name: &str,
        mail: &str,
        properties: &BTreeMap<String, String>,
    ) -> Result<String> {
        let id = profile_id(name, mail);
        if self.profiles.contains_key(&id) {
            bail!("profile id {id} already exists");
        }

        let mut ordered = vec![(NAME_KEY, name), (MAIL_KEY, mail)];
        ordered.extend(
            properties
                .iter()
                .filter(|(key, _)| key.as_str() != NAME_KEY && key.as_str() != MAIL_KEY)
                .map(|(key, value)| (key.as_str(), value.as_str())),
        );

        let mut contents = String::new();
        for (key, value) in &ordered {
            ensure!(
                !key.is_empty() && !key.contains([':', '\n']) && !value.contains([':', '\n']),
                "profile property '{key}' cannot be stored as a key:value line"
            );
            contents.push_str(&format!("{key}:{value}\n"));
        }

        let path = self.path_for(&id);
        fs::write(&path, contents)
            .with_context(|| format!("writing profile {}", path.display()))?;

        let properties = ordered
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        self.profiles.insert(
            id.clone(),
            Profile {
                id: id.clone(),
                properties,
            },
        );
        info!("created profile {id}");
        Ok(id)
    }

    /// Removes a profile from disk. Returns `false` for unknown ids.
    pub fn delete_profile(&mut self, id: &str) -> Result<bool> {
        if !self.profiles.contains_key(id) {
            return Ok(false);
        }
        let path = self.path_for(id);
        fs::remove_file(&path).with_context(|| format!("deleting profile {}", path.display()))?;
        self.profiles.remove(id);
        info!("deleted profile {id}");
        Ok(true)
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.{}", self.extension))
    }
}

fn profile_id(name: &str, mail: &str) -> String {
    let stamp = Local::now().format("%Y%m%d%H%M%S%f");
    let digest = Sha256::digest(format!("{stamp}{name}{mail}").as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(32);
    id
}

fn read_profile_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading profile {}", path.display()))?;
    let file_name = path.display();
    let mut properties = BTreeMap::new();

    for line in raw.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            break;
        }
        let mut parts = line.split(':');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            warn!("profile file {file_name}: line '{line}' has an incorrect format, ignored");
            continue;
        };
        if properties.contains_key(key) {
            warn!("profile file {file_name}: line '{line}' is a duplicate, ignored");
            continue;
        }
        properties.insert(key.to_string(), value.to_string());
    }
    Ok(properties)
}

/// Profile selection and staged deletion on top of a [`ProfileStore`].
#[derive(Debug)]
pub struct ProfileManager {
    store: ProfileStore,
    selected: Option<String>,
    deletion_buffer: Vec<String>,
}

impl ProfileManager {
    pub fn new(store: ProfileStore) -> Self {
        Self {
            store,
            selected: None,
            deletion_buffer: Vec::new(),
        }
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn profile_summaries(&self) -> Vec<ProfileSummary> {
        self.store
            .profiles()
            .map(|profile| ProfileSummary {
                id: profile.id.clone(),
                name: profile.name().unwrap_or_default().to_string(),
            })
            .collect()
    }

    pub fn create_profile(
        &mut self,
        name: &str,
        mail: &str,
        properties: &BTreeMap<String, String>,
    ) -> Result<String> {
        self.store.create_profile(name, mail, properties)
    }

    /// Selects a known profile. Unknown ids leave the selection unchanged.
    pub fn select_profile(&mut self, id: &str) -> bool {
        if !self.store.has_profile(id) {
            return false;
        }
        self.selected = Some(id.to_string());
        true
    }

    pub fn selected_profile(&self) -> Option<&Profile> {
        self.selected
            .as_deref()
            .and_then(|id| self.store.profile(id))
    }

    pub fn add_for_deletion(&mut self, id: &str) -> bool {
        if !self.store.has_profile(id) || self.deletion_buffer.iter().any(|queued| queued == id) {
            return false;
        }
        self.deletion_buffer.push(id.to_string());
        true
    }

    pub fn remove_from_deletion(&mut self, id: &str) -> bool {
        let before = self.deletion_buffer.len();
        self.deletion_buffer.retain(|queued| queued != id);
        self.deletion_buffer.len() != before
    }

    pub fn pending_deletions(&self) -> &[String] {
        &self.deletion_buffer
    }

    /// Deletes every queued profile and returns the ids actually removed.
    /// Ids whose file could not be removed stay queued.
    pub fn confirm_deletion(&mut self) -> Vec<String> {
        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for id in std::mem::take(&mut self.deletion_buffer) {
            match self.store.delete_profile(&id) {
                Ok(true) => {
                    if self.selected.as_deref() == Some(id.as_str()) {
                        self.selected = None;
                    }
                    deleted.push(id);
                }
                Ok(false) => {}
                Err(err) => {
                    warn!("profile {id} could not be deleted: {err:#}");
                    failed.push(id);
                }
            }
        }
        self.deletion_buffer = failed;
        deleted
    }
}
