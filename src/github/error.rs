//! GitHub API error type.
//!
//! Mirror steps never retry, so unlike a retrying client this error does not
//! classify failures; it keeps the HTTP status (when known) for logs and the
//! underlying octocrab error as its source.

use std::fmt;
use thiserror::Error;

/// A failed GitHub API call.
#[derive(Debug, Error)]
pub struct GitHubApiError {
    /// The operation that failed, e.g. "create pull request".
    pub operation: &'static str,

    /// The HTTP status code, if available.
    pub status_code: Option<u16>,

    /// A human-readable description of the error.
    pub message: String,

    /// The underlying octocrab error, if available.
    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(
                f,
                "GitHub API error during {} (HTTP {}): {}",
                self.operation, code, self.message
            ),
            None => write!(
                f,
                "GitHub API error during {}: {}",
                self.operation, self.message
            ),
        }
    }
}

impl GitHubApiError {
    /// Wraps an octocrab error.
    pub fn from_octocrab(operation: &'static str, err: octocrab::Error) -> Self {
        let status_code = match &err {
            octocrab::Error::GitHub { source, .. } => Some(source.status_code.as_u16()),
            _ => None,
        };
        let message = match &err {
            octocrab::Error::GitHub { source, .. } => source.message.clone(),
            other => other.to_string(),
        };

        Self {
            operation,
            status_code,
            message,
            source: Some(err),
        }
    }

    /// Creates an error with no octocrab source (e.g. a malformed response).
    pub fn without_source(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error carrying only an HTTP status.
    pub fn with_status(operation: &'static str, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            operation,
            status_code: Some(status_code),
            message: message.into(),
            source: None,
        }
    }
}
