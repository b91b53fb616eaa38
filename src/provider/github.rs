//! GitHub provider implementation.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
#[cfg(test)]
use reqwest::Client;

use crate::http::HttpClient;

use super::{BranchHead, MAX_TAG_PAGES, Provider, RepoLocation, RepositoryMetadata, Tag};

/// Default public GitHub API endpoint.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// GitHub API response types (internal).
mod api {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct RepoInfo {
        pub default_branch: String,
    }

    #[derive(Deserialize, Debug)]
    pub struct Commit {
        pub sha: String,
    }

    #[derive(Deserialize, Debug)]
    pub struct Tag {
        pub name: String,
        pub commit: Commit,
    }

    #[derive(Deserialize, Debug)]
    pub struct Branch {
        pub name: String,
        pub commit: Commit,
    }
}

/// GitHub provider implementation.
pub struct GitHubProvider {
    http_client: HttpClient,
    api_url: String,
}

impl GitHubProvider {
    /// Create a new GitHub provider with default API URL.
    #[cfg(test)]
    pub fn new(client: Client) -> Self {
        Self::with_api_url(client, GITHUB_API_URL)
    }

    /// Create a new GitHub provider with custom API URL.
    #[cfg(test)]
    pub fn with_api_url(client: Client, api_url: &str) -> Self {
        Self::from_http_client(
            HttpClient::new(client).with_retry_delay(std::time::Duration::from_millis(1)),
            api_url,
        )
    }

    /// Create from an existing HttpClient.
    pub fn from_http_client(http_client: HttpClient, api_url: &str) -> Self {
        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_repo_info(&self, repo: &RepoLocation) -> Result<api::RepoInfo> {
        let url = format!("{}/repos/{}/{}", self.api_url, repo.owner, repo.repo);
        debug!("Fetching repo info from {}...", url);
        self.http_client.get_json(&url).await
    }

    async fn fetch_tags(&self, repo: &RepoLocation) -> Result<Vec<api::Tag>> {
        let url = format!("{}/repos/{}/{}/tags", self.api_url, repo.owner, repo.repo);
        let mut tags = Vec::new();

        for page in 1..=MAX_TAG_PAGES {
            debug!("Fetching tags page {} from {}...", page, url);

            let parsed: Vec<api::Tag> = self
                .http_client
                .get_json_with_query(&url, &[("per_page", "100"), ("page", &page.to_string())])
                .await?;

            if parsed.is_empty() {
                break;
            }
            tags.extend(parsed);
        }

        Ok(tags)
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    async fn fetch_metadata(&self, repo: &RepoLocation) -> Result<RepositoryMetadata> {
        let info = self.fetch_repo_info(repo).await?;
        let branch_head = self.fetch_branch_head(repo, &info.default_branch).await?;
        let tags = self.fetch_tags(repo).await?;

        Ok(RepositoryMetadata {
            tags: tags.into_iter().map(Tag::from).collect(),
            branch_head,
        })
    }

    async fn fetch_branch_head(&self, repo: &RepoLocation, branch: &str) -> Result<BranchHead> {
        let url = format!(
            "{}/repos/{}/{}/branches/{}",
            self.api_url, repo.owner, repo.repo, branch
        );
        debug!("Fetching branch head from {}...", url);
        let branch: api::Branch = self.http_client.get_json(&url).await?;
        Ok(BranchHead {
            name: branch.name,
            commit_ref: branch.commit.sha,
        })
    }

    fn download_url(&self, repo: &RepoLocation, git_ref: &str) -> String {
        format!("{}/archive/{}.zip", repo.web_url(), git_ref)
    }
}

impl From<api::Tag> for Tag {
    fn from(t: api::Tag) -> Self {
        Tag {
            name: t.name,
            commit_ref: t.commit.sha,
        }
    }
}
