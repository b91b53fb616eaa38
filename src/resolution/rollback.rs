//! Historical versions offered as rollback targets.

use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::provider::{Provider, RepositoryMetadata, Tag};

use super::resolver::VersionResolver;
use super::version::{Version, labels_match};

/// Number of rollback targets offered to the host.
pub const ROLLBACK_WINDOW: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackEntry {
    pub version: String,
    pub download_url: String,
}

/// Rollback targets, newest first, unique by version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RollbackList(Vec<RollbackEntry>);

impl RollbackList {
    pub fn entries(&self) -> &[RollbackEntry] {
        &self.0
    }

    pub fn versions(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.version.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<RollbackEntry>> for RollbackList {
    fn from(entries: Vec<RollbackEntry>) -> Self {
        RollbackList(entries)
    }
}

pub struct RollbackCatalog;

impl RollbackCatalog {
    /// Build the rollback list for a component from this cycle's snapshot.
    ///
    /// Only conforming tags are offered. The installed version is never
    /// offered, and at most [`ROLLBACK_WINDOW`] entries are kept.
    pub fn build(
        component: &Component,
        metadata: &RepositoryMetadata,
        provider: &dyn Provider,
    ) -> RollbackList {
        Self::ordered_unique(&metadata.tags)
            .into_iter()
            .filter(|tag| !labels_match(&tag.name, &component.installed_version))
            .take(ROLLBACK_WINDOW)
            .map(|tag| RollbackEntry {
                version: tag.name.clone(),
                download_url: provider.download_url(&component.location, &tag.name),
            })
            .collect::<Vec<_>>()
            .into()
    }

    /// Conforming tags sorted by descending version. Of several tags with
    /// the same version, the one listed last by the provider is kept.
    fn ordered_unique(tags: &[Tag]) -> Vec<&Tag> {
        let mut candidates: Vec<(&Tag, Version)> = VersionResolver::conforming(tags).collect();
        // Stable: equal versions stay in provider order
        candidates.sort_by(|a, b| b.1.cmp(&a.1));

        let mut unique: Vec<(&Tag, Version)> = Vec::with_capacity(candidates.len());
        for (tag, version) in candidates {
            match unique.last_mut() {
                Some(last) if last.1 == version => *last = (tag, version),
                _ => unique.push((tag, version)),
            }
        }

        unique.into_iter().map(|(tag, _)| tag).collect()
    }
}
