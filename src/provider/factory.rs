//! Provider factory.
//!
//! Each component is bound to one provider when it is configured; the
//! factory hands out the shared instance for a [`ProviderKind`].

use std::sync::Arc;

use super::{BitbucketProvider, GitHubProvider, Provider, ProviderKind};
use crate::http::HttpClient;

/// Factory for package providers, one shared instance per kind.
#[derive(Clone)]
pub struct ProviderFactory {
    github: Arc<dyn Provider>,
    bitbucket: Arc<dyn Provider>,
}

impl ProviderFactory {
    /// Create a factory from per-provider HTTP clients and API URLs.
    ///
    /// The clients are separate so each host only ever sees its own token.
    pub fn new(
        github_http: HttpClient,
        github_api_url: &str,
        bitbucket_http: HttpClient,
        bitbucket_api_url: &str,
    ) -> Self {
        Self {
            github: Arc::new(GitHubProvider::from_http_client(github_http, github_api_url)),
            bitbucket: Arc::new(BitbucketProvider::from_http_client(
                bitbucket_http,
                bitbucket_api_url,
            )),
        }
    }

    /// Create a factory from ready-made providers.
    pub fn from_providers(github: Arc<dyn Provider>, bitbucket: Arc<dyn Provider>) -> Self {
        Self { github, bitbucket }
    }

    /// Get the provider for a kind.
    pub fn provider_for(&self, kind: ProviderKind) -> Arc<dyn Provider> {
        match kind {
            ProviderKind::GitHub => self.github.clone(),
            ProviderKind::Bitbucket => self.bitbucket.clone(),
        }
    }
}
