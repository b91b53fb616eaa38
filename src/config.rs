use anyhow::{Context, Result, bail};
use log::debug;
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::component::{Component, ComponentSpec};
use crate::http::HttpClient;
use crate::provider::{BITBUCKET_API_URL, GITHUB_API_URL, ProviderFactory};
use crate::resolution::DEFAULT_FETCH_TIMEOUT;

/// Host configuration: engine settings plus the managed components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
    #[serde(default = "default_bitbucket_api_url")]
    pub bitbucket_api_url: String,
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT.as_secs()
}

fn default_github_api_url() -> String {
    GITHUB_API_URL.to_string()
}

fn default_bitbucket_api_url() -> String {
    BITBUCKET_API_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            github_api_url: default_github_api_url(),
            bitbucket_api_url: default_bitbucket_api_url(),
            components: Vec::new(),
        }
    }
}

impl Config {
    /// `<config_dir>/ghu/components.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ghu").join("components.json"))
    }

    #[tracing::instrument]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        if config.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs in {:?} must be greater than 0", path);
        }
        debug!(
            "Loaded {} component(s) from {:?}",
            config.components.len(),
            path
        );
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Validate every component entry.
    pub fn components(&self) -> Result<Vec<Component>> {
        self.components
            .iter()
            .cloned()
            .map(Component::try_from)
            .collect()
    }

    /// Build providers, authenticating with `GITHUB_TOKEN` and
    /// `BITBUCKET_TOKEN` when set.
    pub fn provider_factory(&self) -> Result<ProviderFactory> {
        let timeout = self.fetch_timeout();
        let github = http_client(env::var("GITHUB_TOKEN").ok(), timeout)?;
        let bitbucket = http_client(env::var("BITBUCKET_TOKEN").ok(), timeout)?;

        Ok(ProviderFactory::new(
            github,
            &self.github_api_url,
            bitbucket,
            &self.bitbucket_api_url,
        ))
    }
}

/// HTTP client for one provider, with an optional bearer token.
pub fn http_client(token: Option<String>, timeout: Duration) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        debug!("Using API token for authentication: {}", mask_token(&token));
    }

    let client = Client::builder()
        .user_agent("ghu-cli")
        .default_headers(headers)
        .timeout(timeout)
        .build()?;

    Ok(HttpClient::new(client))
}

/// First and last four characters of a token, for logs.
fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}
