use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of one component's resolution. Never fatal to the engine.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolveError {
    /// Transport, auth, parse failure or timeout. Retried next cycle.
    #[error("Remote repository for {component} is unavailable: {reason}")]
    RemoteUnavailable { component: String, reason: String },

    /// Tag tracking with no conforming tag. A configuration problem.
    #[error("No tag of {component} looks like a version (expected e.g. v1.4.2)")]
    NoResolvableVersion { component: String },

    /// Manual rollback target not among the fetched tags.
    #[error("Version {version} is not a tag of {component}")]
    UnknownVersion { component: String, version: String },

    #[error("Unknown component: {component}")]
    UnknownComponent { component: String },
}

impl ResolveError {
    /// Collapses any adapter failure, keeping the full error chain as text.
    pub fn remote_unavailable(component: &str, error: &anyhow::Error) -> Self {
        ResolveError::RemoteUnavailable {
            component: component.to_string(),
            reason: format!("{:#}", error),
        }
    }

    /// Whether the next cycle may succeed without a configuration change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolveError::RemoteUnavailable { .. })
    }
}
