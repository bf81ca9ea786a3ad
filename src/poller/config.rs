//! Polling configuration.
//!
//! # Interval
//!
//! The platform advertises how often its event feed may be read through the
//! `X-Poll-Interval` response header. The poller honours that hint and falls
//! back to [`PollConfig::default_interval`] until it has seen one. A failed
//! fetch waits the last interval used.
//!
//! # Seen policy
//!
//! Whether a feed entry whose mirror failed is recorded as seen. See
//! [`SeenPolicy`].

use std::time::Duration;

/// Fallback poll interval when the feed sends no hint (60 seconds).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// When a handled feed entry is recorded as seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeenPolicy {
    /// Every handled entry is marked, failed mirrors included. A failed
    /// mirror is never retried from the feed.
    #[default]
    MarkAlways,

    /// Entries whose mirror failed with a retryable error (tool, timeout,
    /// spawn, create, storage) stay unmarked and are retried on the next
    /// poll. Discarded, undecodable and already-mirrored entries are still
    /// marked.
    RetryFailures,
}

/// Configuration for the feed poller.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Interval used until the feed advertises one.
    pub default_interval: Duration,

    pub seen_policy: SeenPolicy,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PollConfig {
    pub fn new() -> Self {
        PollConfig {
            default_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            seen_policy: SeenPolicy::default(),
        }
    }

    /// The interval to wait after a successful fetch.
    pub fn next_interval(&self, hint: Option<Duration>) -> Duration {
        hint.unwrap_or(self.default_interval)
    }
}
