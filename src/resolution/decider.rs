//! Classifies a component as up to date or having an update.

use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::provider::{Provider, RepositoryMetadata};

use super::ResolveError;
use super::resolver::ResolvedVersion;
use super::rollback::{RollbackCatalog, RollbackList};
use super::version::{Version, labels_match};

/// Decision for one component in one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UpdateState {
    UpToDate {
        rollback: RollbackList,
    },
    UpdateAvailable {
        new_version: String,
        download_url: String,
    },
}

impl UpdateState {
    pub fn is_update_available(&self) -> bool {
        matches!(self, UpdateState::UpdateAvailable { .. })
    }

    /// Rollback targets; empty unless up to date.
    pub fn rollback(&self) -> RollbackList {
        match self {
            UpdateState::UpToDate { rollback } => rollback.clone(),
            UpdateState::UpdateAvailable { .. } => RollbackList::default(),
        }
    }
}

pub struct UpdateDecider;

impl UpdateDecider {
    /// Decide the state of a component against its resolved remote version.
    pub fn decide(
        component: &Component,
        resolved: &ResolvedVersion,
        metadata: &RepositoryMetadata,
        provider: &dyn Provider,
    ) -> UpdateState {
        if Self::is_newer(&resolved.label, &component.installed_version) {
            UpdateState::UpdateAvailable {
                new_version: resolved.label.clone(),
                download_url: provider.download_url(&component.location, &resolved.git_ref),
            }
        } else {
            UpdateState::UpToDate {
                rollback: RollbackCatalog::build(component, metadata, provider),
            }
        }
    }

    /// Whether `remote` is an update over `installed`.
    ///
    /// Semantic comparison when both labels conform, otherwise any
    /// difference counts as an update.
    pub fn is_newer(remote: &str, installed: &str) -> bool {
        match (Version::parse(remote), Version::parse(installed)) {
            (Some(remote), Some(installed)) => remote > installed,
            _ => remote != installed,
        }
    }

    /// Manual rollback: install `requested` regardless of ordering.
    ///
    /// The target is looked up by exact tag name first, then by version
    /// equality (`1.0.0` finds `v1.0.0`). The name of the snapshot's branch
    /// is accepted too and installs its head commit.
    pub fn rollback_to(
        component: &Component,
        requested: &str,
        metadata: &RepositoryMetadata,
        provider: &dyn Provider,
    ) -> Result<UpdateState, ResolveError> {
        let git_ref = Self::find_ref(requested, metadata).ok_or_else(|| {
            ResolveError::UnknownVersion {
                component: component.id.clone(),
                version: requested.to_string(),
            }
        })?;

        Ok(UpdateState::UpdateAvailable {
            new_version: requested.to_string(),
            download_url: provider.download_url(&component.location, &git_ref),
        })
    }

    /// Ref for an arbitrary version label in a snapshot, ignoring the
    /// rollback window.
    pub fn find_ref(label: &str, metadata: &RepositoryMetadata) -> Option<String> {
        if let Some(tag) = metadata.find_tag(label) {
            return Some(tag.name.clone());
        }
        if let Some(tag) = metadata
            .tags
            .iter()
            .rev()
            .find(|t| labels_match(&t.name, label))
        {
            return Some(tag.name.clone());
        }
        let head = &metadata.branch_head;
        (!head.name.is_empty() && head.name == label).then(|| head.commit_ref.clone())
    }
}
