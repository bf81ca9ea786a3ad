//! Upstream event feed poller.
//!
//! Each cycle fetches the upstream repository event feed and walks it oldest
//! first. For every entry:
//!
//! 1. Skip it if the store has seen its id (a failed lookup counts as unseen).
//! 2. Decode the payload and run it through the [`MergeFilter`].
//! 3. Hand a merged pull request to the [`Mirrorer`].
//! 4. Mark the id seen, as the [`SeenPolicy`] dictates. Marks are written
//!    together at the end of the cycle.
//!
//! Per-entry failures are logged and never stop the loop.

pub mod config;


use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::filter::{Discarded, MergeFilter};
use crate::github::{GitHubApiError, PlatformClient};
use crate::mirror::{MirrorError, MirrorResult, MirrorTool, Mirrorer};
use crate::store::{EventStore, has_seen_or_warn};
use crate::types::EventId;
use crate::webhooks::{FeedEvent, parse_feed_event};

pub use config::{DEFAULT_POLL_INTERVAL_SECS, PollConfig, SeenPolicy};

/// What happened to one feed entry.
#[derive(Debug)]
pub enum EventOutcome {
    /// Already handled on an earlier poll.
    AlreadySeen,
    /// The payload could not be decoded.
    Undecodable,
    /// Rejected by the merge filter.
    Discarded(Discarded),
    Mirrored(MirrorResult),
    Failed(MirrorError),
}

/// Tally of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// The feed's interval hint, if it sent one.
    pub poll_interval: Option<Duration>,
    pub fetched: usize,
    pub already_seen: usize,
    pub ignored: usize,
    pub mirrored: usize,
    pub failed: usize,
}

impl PollReport {
    fn count(&mut self, outcome: &EventOutcome) {
        match outcome {
            EventOutcome::AlreadySeen => self.already_seen += 1,
            EventOutcome::Undecodable | EventOutcome::Discarded(_) => self.ignored += 1,
            EventOutcome::Mirrored(_) => self.mirrored += 1,
            EventOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Feeds upstream feed entries to a shared [`Mirrorer`].
pub struct Poller<P, T, S> {
    mirrorer: Arc<Mirrorer<P, T, S>>,
    filter: MergeFilter,
    config: PollConfig,
}

impl<P, T, S> Poller<P, T, S>
where
    P: PlatformClient,
    T: MirrorTool,
    S: EventStore,
{
    pub fn new(mirrorer: Arc<Mirrorer<P, T, S>>, config: PollConfig) -> Self {
        let filter = MergeFilter::new(mirrorer.target_branch());
        Poller {
            mirrorer,
            filter,
            config,
        }
    }

    /// Polls until `shutdown` fires. A mirror in progress is allowed to
    /// finish; the token is only checked between cycles.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval = ?self.config.default_interval,
            seen_policy = ?self.config.seen_policy,
            "Poller started"
        );

        let mut interval = self.config.default_interval;
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.poll_once().await {
                Ok(report) => {
                    interval = self.config.next_interval(report.poll_interval);
                    debug!(
                        fetched = report.fetched,
                        mirrored = report.mirrored,
                        failed = report.failed,
                        next_poll = ?interval,
                        "Poll complete"
                    );
                }
                Err(e) => {
                    warn!(error = %e, retry_in = ?interval, "Failed to fetch upstream events");
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Poller stopped");
    }

    /// Fetches the feed once and handles every entry in it.
    pub async fn poll_once(&self) -> Result<PollReport, GitHubApiError> {
        let page = self.mirrorer.platform().list_repo_events().await?;

        let mut report = PollReport {
            poll_interval: page.poll_interval,
            fetched: page.events.len(),
            ..PollReport::default()
        };

        // The feed lists newest first. Seen marks are written once per cycle.
        let mut handled = Vec::new();
        for event in page.events.iter().rev() {
            let outcome = self.process(event).await;
            if self.should_mark(&outcome) {
                handled.push(event.id.clone());
            }
            report.count(&outcome);
        }
        self.mark_seen(&handled);

        Ok(report)
    }

    /// Handles one feed entry, including the seen bookkeeping.
    pub async fn handle_event(&self, event: &FeedEvent) -> EventOutcome {
        let outcome = self.process(event).await;
        if self.should_mark(&outcome) {
            self.mark_seen(std::slice::from_ref(&event.id));
        }
        outcome
    }

    async fn process(&self, event: &FeedEvent) -> EventOutcome {
        if has_seen_or_warn(self.mirrorer.store(), &event.id) {
            return EventOutcome::AlreadySeen;
        }
        self.dispatch(event).await
    }

    fn mark_seen(&self, event_ids: &[EventId]) {
        if event_ids.is_empty() {
            return;
        }
        if let Err(e) = self.mirrorer.store().mark_seen_many(event_ids) {
            error!(event_ids = ?event_ids, error = %e, "Failed to record feed events as seen");
        }
    }

    async fn dispatch(&self, event: &FeedEvent) -> EventOutcome {
        let decoded = match parse_feed_event(event) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Dropping undecodable feed event");
                return EventOutcome::Undecodable;
            }
        };

        let pr = match self.filter.normalize(decoded, Some(event.id.clone())) {
            Ok(pr) => pr,
            Err(reason) => {
                debug!(event_id = %event.id, reason = %reason, "Ignoring feed event");
                return EventOutcome::Discarded(reason);
            }
        };

        match self.mirrorer.mirror_pull_request(&pr).await {
            Ok(result) => EventOutcome::Mirrored(result),
            Err(e) => {
                debug!(event_id = %event.id, pr = %pr.number, error = %e, "Feed event not mirrored");
                EventOutcome::Failed(e)
            }
        }
    }

    fn should_mark(&self, outcome: &EventOutcome) -> bool {
        match (self.config.seen_policy, outcome) {
            (_, EventOutcome::AlreadySeen) => false,
            (SeenPolicy::MarkAlways, _) => true,
            (SeenPolicy::RetryFailures, EventOutcome::Failed(e)) => !e.is_retryable(),
            (SeenPolicy::RetryFailures, _) => true,
        }
    }
}
