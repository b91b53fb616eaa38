//! Retry classification for provider API requests.

use reqwest::StatusCode;
use thiserror::Error;

/// Maximum number of attempts for a single API request.
pub const MAX_RETRIES: usize = 3;

/// Delay between attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Errors that will not succeed on a retry within the same cycle.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NonRetryableError {
    #[error("Rate limit exceeded ({0}). Try again later or configure an API token.")]
    RateLimitExceeded(String),

    #[error("Authentication failed ({0}). Check GITHUB_TOKEN / BITBUCKET_TOKEN.")]
    AuthenticationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access forbidden ({0}). The repository may be private.")]
    Forbidden(String),

    #[error("Request error: {0}")]
    ClientError(String),
}

/// Classifies a status error as retryable (`Ok`) or not (`Err`).
pub fn classify_error(error: &reqwest::Error) -> Result<(), NonRetryableError> {
    let Some(status) = error.status() else {
        // Connection errors and timeouts
        return Ok(());
    };

    let url = error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "unknown url".to_string());

    match status {
        StatusCode::UNAUTHORIZED => Err(NonRetryableError::AuthenticationFailed(url)),
        StatusCode::FORBIDDEN => Err(NonRetryableError::Forbidden(url)),
        StatusCode::TOO_MANY_REQUESTS => Err(NonRetryableError::RateLimitExceeded(url)),
        StatusCode::NOT_FOUND => Err(NonRetryableError::NotFound(url)),
        s if s.is_client_error() => Err(NonRetryableError::ClientError(format!(
            "HTTP {} from {}",
            s.as_u16(),
            url
        ))),
        // 5xx
        _ => Ok(()),
    }
}

/// Maps an `error_for_status()` failure to an `anyhow::Error`, wrapping
/// non-retryable statuses in [`NonRetryableError`].
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    match classify_error(&error) {
        Ok(()) => anyhow::Error::from(error),
        Err(non_retryable) => anyhow::Error::from(non_retryable),
    }
}
