//! Picks the remote version of a component from a metadata snapshot.

use serde::{Deserialize, Serialize};

use crate::component::{Component, Tracking};
use crate::provider::{RepositoryMetadata, Tag};

use super::ResolveError;
use super::version::Version;

/// The version the engine considers "current remote" this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVersion {
    /// Tag name, or the tracked branch name.
    pub label: String,
    /// Ref the artifact is downloaded by.
    pub git_ref: String,
    pub is_branch_head: bool,
}

/// Version resolver - pure functions over a metadata snapshot.
pub struct VersionResolver;

impl VersionResolver {
    /// Resolve the remote version for a component.
    ///
    /// Branch tracking takes the branch head without looking at tags. Tag
    /// tracking takes the highest conforming tag.
    pub fn resolve(
        component: &Component,
        metadata: &RepositoryMetadata,
    ) -> Result<ResolvedVersion, ResolveError> {
        match &component.tracking {
            Tracking::Branch(branch) => Ok(ResolvedVersion {
                label: branch.clone(),
                git_ref: metadata.branch_head.commit_ref.clone(),
                is_branch_head: true,
            }),
            Tracking::Tag => Self::newest_tag(&metadata.tags)
                .map(|tag| ResolvedVersion {
                    label: tag.name.clone(),
                    git_ref: tag.name.clone(),
                    is_branch_head: false,
                })
                .ok_or_else(|| ResolveError::NoResolvableVersion {
                    component: component.id.clone(),
                }),
        }
    }

    /// Highest conforming tag.
    ///
    /// When two tags normalize to the same version, the later one in
    /// provider order wins.
    pub fn newest_tag(tags: &[Tag]) -> Option<&Tag> {
        let mut best: Option<(&Tag, Version)> = None;
        for (tag, version) in Self::conforming(tags) {
            if best.as_ref().is_none_or(|(_, current)| version >= *current) {
                best = Some((tag, version));
            }
        }
        best.map(|(tag, _)| tag)
    }

    /// Tags that follow the version grammar, with their parsed versions,
    /// in provider order.
    pub fn conforming(tags: &[Tag]) -> impl Iterator<Item = (&Tag, Version)> {
        tags.iter()
            .filter_map(|tag| Version::parse(&tag.name).map(|version| (tag, version)))
    }
}
