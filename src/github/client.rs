//! Octocrab-backed [`PlatformClient`].
//!
//! One client serves both repositories: pull requests and labels go to the
//! downstream repository, the event feed is read from the upstream one.

use std::time::Duration;

use octocrab::Octocrab;
use tracing::warn;

use crate::types::{PrNumber, RepoId};
use crate::webhooks::FeedEvent;

use super::error::GitHubApiError;
use super::platform::{EventFeedPage, NewPullRequest, PlatformClient};

/// Header carrying the platform's requested poll interval, in seconds.
const POLL_INTERVAL_HEADER: &str = "x-poll-interval";

/// Feed entries requested per fetch.
const EVENTS_PER_PAGE: u32 = 100;

/// A GitHub API client bound to an upstream and a downstream repository.
#[derive(Clone)]
pub struct OctocrabClient {
    client: Octocrab,
    upstream: RepoId,
    downstream: RepoId,
}

impl OctocrabClient {
    pub fn new(client: Octocrab, upstream: RepoId, downstream: RepoId) -> Self {
        Self {
            client,
            upstream,
            downstream,
        }
    }

    /// Creates a client authenticated with a personal access token.
    pub fn from_token(
        token: impl Into<String>,
        upstream: RepoId,
        downstream: RepoId,
    ) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder().personal_token(token.into()).build()?;
        Ok(Self::new(client, upstream, downstream))
    }

    /// The repository whose merges are mirrored.
    pub fn upstream(&self) -> &RepoId {
        &self.upstream
    }

    /// The repository mirrored pull requests are opened in.
    pub fn downstream(&self) -> &RepoId {
        &self.downstream
    }
}

impl std::fmt::Debug for OctocrabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabClient")
            .field("upstream", &self.upstream)
            .field("downstream", &self.downstream)
            .finish_non_exhaustive()
    }
}

impl PlatformClient for OctocrabClient {
    async fn create_pull_request(&self, pr: &NewPullRequest) -> Result<PrNumber, GitHubApiError> {
        let created = self
            .client
            .pulls(&self.downstream.owner, &self.downstream.repo)
            .create(&pr.title, &pr.head, &pr.base)
            .body(&pr.body)
            .maintainer_can_modify(pr.maintainer_can_modify)
            .send()
            .await
            .map_err(|e| GitHubApiError::from_octocrab("create pull request", e))?;

        Ok(PrNumber(created.number))
    }

    async fn add_labels(&self, pr: PrNumber, labels: &[String]) -> Result<(), GitHubApiError> {
        self.client
            .issues(&self.downstream.owner, &self.downstream.repo)
            .add_labels(pr.0, labels)
            .await
            .map_err(|e| GitHubApiError::from_octocrab("add labels", e))?;
        Ok(())
    }

    async fn list_repo_events(&self) -> Result<EventFeedPage, GitHubApiError> {
        const OPERATION: &str = "list repo events";

        // The typed API drops response headers, and the poll interval lives in one.
        let route = format!(
            "/repos/{}/{}/events?per_page={}",
            self.upstream.owner, self.upstream.repo, EVENTS_PER_PAGE
        );
        let response = self
            .client
            ._get(route.as_str())
            .await
            .map_err(|e| GitHubApiError::from_octocrab(OPERATION, e))?;
        let response = octocrab::map_github_error(response)
            .await
            .map_err(|e| GitHubApiError::from_octocrab(OPERATION, e))?;

        let poll_interval = response
            .headers()
            .get(POLL_INTERVAL_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_poll_interval);

        let body = self
            .client
            .body_to_string(response)
            .await
            .map_err(|e| GitHubApiError::from_octocrab(OPERATION, e))?;
        let events = decode_feed(&body).map_err(|e| {
            GitHubApiError::without_source(OPERATION, format!("malformed event feed: {e}"))
        })?;

        Ok(EventFeedPage {
            events,
            poll_interval,
        })
    }
}

/// Decodes a feed page entry by entry. The page must be a JSON array; an
/// entry with a bad envelope is logged and skipped.
fn decode_feed(body: &str) -> Result<Vec<FeedEvent>, serde_json::Error> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let events = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed feed entry");
                None
            }
        })
        .collect();
    Ok(events)
}

/// Parses an `X-Poll-Interval` header value (whole seconds).
fn parse_poll_interval(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
