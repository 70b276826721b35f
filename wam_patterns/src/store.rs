use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::error;
use thiserror::Error;
use walkdir::WalkDir;

pub const DEFAULT_PATTERN_EXTENSION: &str = "wampat";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("pattern file {} can't be found", path.display())]
    NotFound { path: PathBuf },
    #[error("pattern {name} is empty")]
    Empty { name: String },
    #[error("reading pattern file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Read-only view of the pattern directory.
#[derive(Debug, Clone)]
pub struct PatternStore {
    root: PathBuf,
    extension: String,
}

impl PatternStore {
    /// Opens `root`, creating the directory when it does not exist yet.
    pub fn open(root: impl Into<PathBuf>, extension: impl Into<String>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating pattern directory {}", root.display()))?;
        Ok(Self {
            root,
            extension: extension.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{}", self.extension))
    }

    /// Names (file stems) of every pattern file, sorted.
    pub fn list_patterns(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry =
                entry.with_context(|| format!("listing patterns in {}", self.root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext == self.extension)
                .unwrap_or(false);
            if !matches {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Reads a pattern's lines. Failures are logged before being returned.
    pub fn load_pattern(&self, name: &str) -> Result<Vec<String>, LoadError> {
        let result = self.read_lines(name);
        if let Err(err) = &result {
            error!("{err}");
        }
        result
    }

    fn read_lines(&self, name: &str) -> Result<Vec<String>, LoadError> {
        let path = self.path_for(name);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(LoadError::NotFound { path });
            }
            Err(source) => return Err(LoadError::Io { path, source }),
        };
        if contents.trim().is_empty() {
            return Err(LoadError::Empty {
                name: name.to_string(),
            });
        }
        Ok(contents.split('\n').map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::{LoadError, PatternStore, DEFAULT_PATTERN_EXTENSION};

    #[test]
    fn open_creates_missing_directory() -> Result<()> {
        let temp = tempdir()?;
        let root = temp.path().join("TestPatterns");
        let store = PatternStore::open(&root, DEFAULT_PATTERN_EXTENSION)?;
        assert!(root.is_dir());
        assert!(store.list_patterns()?.is_empty());
        Ok(())
    }

    #[test]
    fn lists_only_matching_extension() -> Result<()> {
        let temp = tempdir()?;
        let store = PatternStore::open(temp.path(), DEFAULT_PATTERN_EXTENSION)?;
        fs::write(temp.path().join("warmup.wampat"), "START:()\n")?;
        fs::write(temp.path().join("advanced.wampat"), "START:()\n")?;
        fs::write(temp.path().join("notes.txt"), "not a pattern")?;
        fs::create_dir(temp.path().join("nested.wampat"))?;

        assert_eq!(store.list_patterns()?, vec!["advanced", "warmup"]);
        Ok(())
    }

    #[test]
    fn load_splits_lines() -> Result<()> {
        let temp = tempdir()?;
        let store = PatternStore::open(temp.path(), DEFAULT_PATTERN_EXTENSION)?;
        fs::write(
            store.path_for("session"),
            "START:()\r\nWAIT:(TIME=1)\r\nSTOP:()",
        )?;

        let lines = store.load_pattern("session")?;
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "WAIT:(TIME=1)\r");
        Ok(())
    }

    #[test]
    fn missing_and_empty_files_are_distinct_failures() -> Result<()> {
        let temp = tempdir()?;
        let store = PatternStore::open(temp.path(), DEFAULT_PATTERN_EXTENSION)?;
        fs::write(store.path_for("blank"), "\n  \n")?;

        assert!(matches!(
            store.load_pattern("absent"),
            Err(LoadError::NotFound { .. })
        ));
        assert!(matches!(
            store.load_pattern("blank"),
            Err(LoadError::Empty { ref name }) if name == "blank"
        ));
        Ok(())
    }
}
