use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::profiles::DEFAULT_PROFILE_EXTENSION;
use crate::store::DEFAULT_PATTERN_EXTENSION;

/// Where patterns and profiles live on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_root: PathBuf,
    pub patterns_dir: String,
    pub pattern_extension: String,
    pub profiles_dir: String,
    pub profile_extension: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            patterns_dir: "TestPatterns".to_string(),
            pattern_extension: DEFAULT_PATTERN_EXTENSION.to_string(),
            profiles_dir: "UserProfiles".to_string(),
            profile_extension: DEFAULT_PROFILE_EXTENSION.to_string(),
        }
    }
}

impl StorageConfig {
    /// Reads a JSON config; a missing path or file yields the defaults.
    pub fn from_json_file(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config json: {}", path.display()))
    }

    pub fn pattern_root(&self) -> PathBuf {
        self.data_root.join(&self.patterns_dir)
    }

    pub fn profile_root(&self) -> PathBuf {
        self.data_root.join(&self.profiles_dir)
    }
}
