//! Bitbucket provider implementation (API 2.0).

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
#[cfg(test)]
use reqwest::Client;

use crate::http::HttpClient;

use super::{BranchHead, MAX_TAG_PAGES, Provider, RepoLocation, RepositoryMetadata, Tag};

/// Default public Bitbucket Cloud API endpoint.
pub const BITBUCKET_API_URL: &str = "https://api.bitbucket.org/2.0";

/// Bitbucket API response types (internal).
mod api {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct RepoInfo {
        pub mainbranch: MainBranch,
    }

    #[derive(Deserialize, Debug)]
    pub struct MainBranch {
        pub name: String,
    }

    #[derive(Deserialize, Debug)]
    pub struct Target {
        pub hash: String,
    }

    /// Both tags and branches are "refs" with a name and a target commit.
    #[derive(Deserialize, Debug)]
    pub struct Ref {
        pub name: String,
        pub target: Target,
    }

    #[derive(Deserialize, Debug)]
    pub struct RefPage {
        pub values: Vec<Ref>,
        pub next: Option<String>,
    }
}

/// Bitbucket provider implementation.
pub struct BitbucketProvider {
    http_client: HttpClient,
    api_url: String,
}

impl BitbucketProvider {
    /// Create a new Bitbucket provider with default API URL.
    #[cfg(test)]
    pub fn new(client: Client) -> Self {
        Self::with_api_url(client, BITBUCKET_API_URL)
    }

    /// Create a new Bitbucket provider with custom API URL.
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

    fn repo_api_url(&self, repo: &RepoLocation) -> String {
        format!("{}/repositories/{}/{}", self.api_url, repo.owner, repo.repo)
    }

    async fn fetch_tags(&self, repo: &RepoLocation) -> Result<Vec<api::Ref>> {
        let url = format!("{}/refs/tags", self.repo_api_url(repo));
        debug!("Fetching tags from {}...", url);

        let mut page: api::RefPage = self
            .http_client
            .get_json_with_query(&url, &[("pagelen", "100")])
            .await?;
        let mut tags = std::mem::take(&mut page.values);

        // Follow `next` links, bounded like the GitHub listing
        for _ in 1..MAX_TAG_PAGES {
            let Some(next) = page.next.take() else {
                break;
            };
            debug!("Fetching next tags page from {}...", next);
            page = self.http_client.get_json(&next).await?;
            tags.append(&mut page.values);
        }

        Ok(tags)
    }
}

#[async_trait]
impl Provider for BitbucketProvider {
    async fn fetch_metadata(&self, repo: &RepoLocation) -> Result<RepositoryMetadata> {
        let url = self.repo_api_url(repo);
        debug!("Fetching repo info from {}...", url);
        let info: api::RepoInfo = self.http_client.get_json(&url).await?;

        let branch_head = self.fetch_branch_head(repo, &info.mainbranch.name).await?;
        let tags = self.fetch_tags(repo).await?;

        Ok(RepositoryMetadata {
            tags: tags.into_iter().map(Tag::from).collect(),
            branch_head,
        })
    }

    async fn fetch_branch_head(&self, repo: &RepoLocation, branch: &str) -> Result<BranchHead> {
        let url = format!("{}/refs/branches/{}", self.repo_api_url(repo), branch);
        debug!("Fetching branch head from {}...", url);
        let branch: api::Ref = self.http_client.get_json(&url).await?;
        Ok(BranchHead {
            name: branch.name,
            commit_ref: branch.target.hash,
        })
    }

    fn download_url(&self, repo: &RepoLocation, git_ref: &str) -> String {
        format!("{}/get/{}.zip", repo.web_url(), git_ref)
    }
}

impl From<api::Ref> for Tag {
    fn from(r: api::Ref) -> Self {
        Tag {
            name: r.name,
            commit_ref: r.target.hash,
        }
    }
}
