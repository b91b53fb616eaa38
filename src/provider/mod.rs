//! Provider abstraction for remote source-code hosts.
//!
//! A provider translates a host's tag/branch listing into a normalized
//! [`RepositoryMetadata`] snapshot and knows how that host serves zip
//! archives for a given ref.

mod bitbucket;
mod factory;
mod github;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use bitbucket::{BITBUCKET_API_URL, BitbucketProvider};
pub use factory::ProviderFactory;
pub use github::{GITHUB_API_URL, GitHubProvider};

/// Upper bound on paginated tag listings (100 tags per page).
pub(crate) const MAX_TAG_PAGES: usize = 10;

/// Location of a repository on its web host, parsed from a repository URI
/// such as `https://github.com/owner/repo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoLocation {
    /// Scheme and host, without a trailing slash (e.g. `https://github.com`).
    pub host_url: String,
    pub owner: String,
    pub repo: String,
}

impl RepoLocation {
    /// Base URL that artifact paths are appended to.
    pub fn web_url(&self) -> String {
        format!("{}/{}/{}", self.host_url, self.owner, self.repo)
    }
}

impl fmt::Display for RepoLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoLocation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s.trim())
            .with_context(|| format!("Invalid repository URI: {}", s))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            anyhow::bail!("Repository URI must use http or https: {}", s);
        }
        let host = url
            .host_str()
            .with_context(|| format!("Repository URI has no host: {}", s))?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|parts| parts.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        if segments.len() != 2 {
            anyhow::bail!(
                "Invalid repository URI: {}. Expected 'https://host/owner/repo'.",
                s
            );
        }

        let repo = segments[1].strip_suffix(".git").unwrap_or(segments[1]);
        if repo.is_empty() {
            anyhow::bail!("Invalid repository URI: {}. Repository name is empty.", s);
        }

        let host_url = match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        };

        Ok(RepoLocation {
            host_url,
            owner: segments[0].to_string(),
            repo: repo.to_string(),
        })
    }
}

/// A tag as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    /// Commit the tag points at.
    pub commit_ref: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, commit_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commit_ref: commit_ref.into(),
        }
    }
}

/// Head commit of a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BranchHead {
    pub name: String,
    pub commit_ref: String,
}

/// Normalized, read-only snapshot of a remote repository for one
/// resolution cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepositoryMetadata {
    /// Tags in provider order, not necessarily version-sorted.
    pub tags: Vec<Tag>,
    /// Head of the branch this snapshot follows: the repository's default
    /// branch, or the tracked branch once [`Self::with_branch_head`] applied.
    pub branch_head: BranchHead,
}

impl RepositoryMetadata {
    /// Replaces the branch head, consuming the snapshot.
    pub fn with_branch_head(mut self, head: BranchHead) -> Self {
        self.branch_head = head;
        self
    }

    /// Finds a tag by its literal name.
    pub fn find_tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }
}

/// Provider kind identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    GitHub,
    Bitbucket,
}

impl ProviderKind {
    /// Infers the provider from a repository URI host.
    ///
    /// Hosts containing "bitbucket" map to Bitbucket, everything else
    /// (github.com and GitHub Enterprise) to GitHub.
    pub fn infer_from_uri(uri: &str) -> ProviderKind {
        let host = Url::parse(uri)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
            .unwrap_or_default();
        if host.contains("bitbucket") {
            ProviderKind::Bitbucket
        } else {
            ProviderKind::GitHub
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::GitHub => write!(f, "github"),
            ProviderKind::Bitbucket => write!(f, "bitbucket"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(ProviderKind::GitHub),
            "bitbucket" => Ok(ProviderKind::Bitbucket),
            _ => anyhow::bail!(
                "Unknown provider kind: {}. Expected github or bitbucket.",
                s
            ),
        }
    }
}

/// Trait for remote repository hosts (GitHub, Bitbucket).
///
/// The engine only talks to this surface; which implementation backs a
/// component is decided once, when the component is configured.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Fetch tags and the default branch head of a repository.
    async fn fetch_metadata(&self, repo: &RepoLocation) -> Result<RepositoryMetadata>;

    /// Fetch the head commit of a named branch.
    async fn fetch_branch_head(&self, repo: &RepoLocation, branch: &str) -> Result<BranchHead>;

    /// Build the zip archive URL for a ref. Pure and deterministic.
    fn download_url(&self, repo: &RepoLocation, git_ref: &str) -> String;
}
