//! GitHub API error types.

use std::time::Duration;

use thiserror::Error;

use crate::http::HttpError;

/// Errors that can occur when talking to the GitHub API.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("http error: {0}")]
    Http(#[from] HttpError),

    #[error("unexpected status {status} for {route}")]
    Status { status: u16, route: String },

    /// Core quota exhausted; the server said when it resets.
    #[error("primary rate limit exceeded, retry after {}s", retry_after.as_secs())]
    PrimaryRateLimit { retry_after: Duration },

    /// Abuse-detection throttle; the server said how long to wait.
    #[error("secondary rate limit exceeded, retry after {}s", retry_after.as_secs())]
    SecondaryRateLimit { retry_after: Duration },

    #[error("malformed response for {route}: {source}")]
    Decode {
        route: String,
        #[source]
        source: serde_json::Error,
    },

    /// The response is valid JSON but is missing the shape the caller
    /// navigated to (e.g. a paginated collection path).
    #[error("response for {route} is missing {path}")]
    MissingData { route: String, path: String },

    #[error("unknown query template: {0}")]
    UnknownQuery(String),
}

impl GitHubError {
    /// True for primary or secondary rate-limit errors.
    #[must_use]
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            GitHubError::PrimaryRateLimit { .. } | GitHubError::SecondaryRateLimit { .. }
        )
    }

    /// The server-specified wait, when the error carries one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GitHubError::PrimaryRateLimit { retry_after }
            | GitHubError::SecondaryRateLimit { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Short message for progress reporting.
    #[must_use]
    pub fn short_message(&self) -> String {
        match self {
            GitHubError::Status { status, route } => format!("status {status} on {route}"),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_classification_helpers() {
        let primary = GitHubError::PrimaryRateLimit {
            retry_after: Duration::from_secs(42),
        };
        assert!(primary.is_rate_limit());
        assert_eq!(primary.retry_after(), Some(Duration::from_secs(42)));

        let secondary = GitHubError::SecondaryRateLimit {
            retry_after: Duration::from_secs(7),
        };
        assert!(secondary.is_rate_limit());
        assert_eq!(secondary.retry_after(), Some(Duration::from_secs(7)));

        let status = GitHubError::Status {
            status: 404,
            route: "/repos/acme/api".to_string(),
        };
        assert!(!status.is_rate_limit());
        assert_eq!(status.retry_after(), None);
    }
}
