//! Components under update management.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::provider::{ProviderKind, RepoLocation};

/// Whether a component follows a branch or the highest version tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    Branch,
    #[default]
    Tag,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingMode::Branch => write!(f, "branch"),
            TrackingMode::Tag => write!(f, "tag"),
        }
    }
}

/// Tracking target. A branch name exists exactly in branch mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tracking {
    Branch(String),
    Tag,
}

/// Component entry as written by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub id: String,
    pub installed_version: String,
    pub repository_uri: String,
    /// Inferred from the repository URI when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    #[serde(default)]
    pub tracking_mode: TrackingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_branch: Option<String>,
}

/// A validated, installed unit tracked for updates.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub id: String,
    pub installed_version: String,
    pub repository_uri: String,
    pub location: RepoLocation,
    pub provider: ProviderKind,
    pub tracking: Tracking,
}

impl Component {
    pub fn tracking_mode(&self) -> TrackingMode {
        match self.tracking {
            Tracking::Branch(_) => TrackingMode::Branch,
            Tracking::Tag => TrackingMode::Tag,
        }
    }

    pub fn tracked_branch(&self) -> Option<&str> {
        match &self.tracking {
            Tracking::Branch(name) => Some(name),
            Tracking::Tag => None,
        }
    }
}

impl TryFrom<ComponentSpec> for Component {
    type Error = anyhow::Error;

    fn try_from(spec: ComponentSpec) -> Result<Self> {
        if spec.id.trim().is_empty() {
            bail!("Component id must not be empty");
        }

        let location: RepoLocation = spec
            .repository_uri
            .parse()
            .with_context(|| format!("Invalid repository for component {}", spec.id))?;

        let branch = spec.tracked_branch.filter(|b| !b.trim().is_empty());
        let tracking = match (spec.tracking_mode, branch) {
            (TrackingMode::Branch, Some(name)) => Tracking::Branch(name),
            (TrackingMode::Branch, None) => {
                bail!("Component {} tracks a branch but names none", spec.id)
            }
            (TrackingMode::Tag, None) => Tracking::Tag,
            (TrackingMode::Tag, Some(name)) => bail!(
                "Component {} tracks tags but also names branch {}",
                spec.id,
                name
            ),
        };

        let provider = spec
            .provider
            .unwrap_or_else(|| ProviderKind::infer_from_uri(&spec.repository_uri));

        Ok(Component {
            id: spec.id,
            installed_version: spec.installed_version,
            repository_uri: spec.repository_uri,
            location,
            provider,
            tracking,
        })
    }
}
