use super::cluster::ClusterState;
use super::database::DatabaseState;
use super::follower::FollowerState;
use crate::error::{KqlDriftError, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct StateFile {
    pub path: PathBuf,
    pub content: String,
}

/// Reads declared state from YAML files.
pub struct StateLoader;

impl StateLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load_database(&self, path: impl AsRef<Path>) -> Result<DatabaseState> {
        let path = path.as_ref();
        let mut state: DatabaseState = self.load_yaml(path)?;
        if state.name.is_empty() {
            state.name = file_stem(path)?;
        }
        Ok(state)
    }

    pub fn load_cluster(&self, path: impl AsRef<Path>) -> Result<ClusterState> {
        let path = path.as_ref();
        let mut state: ClusterState = self.load_yaml(path)?;
        if state.name.is_empty() {
            state.name = file_stem(path)?;
        }
        Ok(state)
    }

    pub fn load_follower(&self, path: impl AsRef<Path>) -> Result<FollowerState> {
        self.load_yaml(path)
    }

    /// Loads every `*.yaml` file below `path` as a database, sorted by name.
    pub fn load_database_dir(&self, path: impl AsRef<Path>) -> Result<Vec<DatabaseState>> {
        let mut databases = Self::list_dir(&path, "yaml")?
            .into_iter()
            .map(|file| self.load_database(&file))
            .collect::<Result<Vec<_>>>()?;
        databases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(databases)
    }

    pub fn read_file(path: impl AsRef<Path>) -> Result<StateFile> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            KqlDriftError::StateLoad(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(StateFile {
            path: path.to_path_buf(),
            content,
        })
    }

    fn list_dir(path: impl AsRef<Path>, extension: &str) -> Result<Vec<PathBuf>> {
        let pattern = format!("{}/**/*.{}", path.as_ref().display(), extension);
        let files = glob::glob(&pattern)
            .map_err(|e| KqlDriftError::StateLoad(e.to_string()))?
            .filter_map(|entry| entry.ok())
            .collect();
        Ok(files)
    }

    fn load_yaml<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T> {
        let file = Self::read_file(path)?;
        debug!(path = %file.path.display(), "Loading state file");
        serde_yaml::from_str(&file.content).map_err(|e| {
            KqlDriftError::StateLoad(format!("{}: {}", file.path.display(), e))
        })
    }
}

impl Default for StateLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| KqlDriftError::StateLoad(format!("invalid file name {}", path.display())))
}
