//! The platform operations the mirror depends on.
//!
//! The orchestrator and poller are generic over [`PlatformClient`] so tests
//! can substitute a recording mock for the real API.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::types::PrNumber;
use crate::webhooks::FeedEvent;

use super::error::GitHubApiError;

/// A pull request to open in the downstream repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    /// Branch the changes are on.
    pub head: String,
    /// Branch to merge into.
    pub base: String,
    pub maintainer_can_modify: bool,
}

/// One fetch of the upstream repository event feed.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFeedPage {
    /// Feed entries as returned (newest first).
    pub events: Vec<FeedEvent>,

    /// The platform's requested delay before the next fetch, if it sent one.
    pub poll_interval: Option<Duration>,
}

/// Operations against the hosting platform.
pub trait PlatformClient: Send + Sync {
    /// Opens a pull request in the downstream repository and returns its number.
    fn create_pull_request(
        &self,
        pr: &NewPullRequest,
    ) -> impl Future<Output = Result<PrNumber, GitHubApiError>> + Send;

    /// Adds labels to a downstream pull request.
    fn add_labels(
        &self,
        pr: PrNumber,
        labels: &[String],
    ) -> impl Future<Output = Result<(), GitHubApiError>> + Send;

    /// Fetches the upstream repository event feed.
    fn list_repo_events(&self)
    -> impl Future<Output = Result<EventFeedPage, GitHubApiError>> + Send;
}
