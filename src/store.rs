//! Durable storage for the last status of each component.

use anyhow::{Context, Result};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::resolution::ComponentStatus;

/// Where the engine keeps statuses between process runs.
#[cfg_attr(test, mockall::automock)]
pub trait StateStore: Send + Sync {
    /// Load saved statuses; an absent store is empty.
    fn load(&self) -> Result<HashMap<String, ComponentStatus>>;

    /// Replace all saved statuses.
    fn save(&self, statuses: &HashMap<String, ComponentStatus>) -> Result<()>;
}

/// JSON file store. Writes go to a sibling temp file that is renamed over
/// the target, so readers never see a partial file.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<data_dir>/ghu/state.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("ghu").join("state.json"))
    }
}

impl StateStore for FileStateStore {
    #[tracing::instrument(skip(self))]
    fn load(&self) -> Result<HashMap<String, ComponentStatus>> {
        if !self.path.exists() {
            debug!("No saved state at {:?}", self.path);
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file {:?}", self.path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file {:?}", self.path))
    }

    #[tracing::instrument(skip(self, statuses))]
    fn save(&self, statuses: &HashMap<String, ComponentStatus>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(statuses)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move {:?} into place", tmp))?;

        debug!("Saved state for {} component(s)", statuses.len());
        Ok(())
    }
}
