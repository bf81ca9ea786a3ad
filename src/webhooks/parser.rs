//! Payload decoding for webhook deliveries and feed entries.
//!
//! # Parsing Strategy
//!
//! 1. The event kind comes from the `X-GitHub-Event` header (webhooks) or the
//!    entry's `type` field (feed).
//! 2. Pull request payloads are decoded into [`PullRequestEvent`].
//! 3. Unknown kinds become [`PlatformEvent::Unrecognized`], not errors.
//! 4. Malformed payloads are a [`DecodeError`].

use serde::Deserialize;
use thiserror::Error;

use crate::types::{EventId, PrAction, PrNumber};

use super::events::{PlatformEvent, PullRequestEvent};

/// Webhook event name for pull request deliveries.
pub const WEBHOOK_PULL_REQUEST: &str = "pull_request";
/// Webhook event name for the configuration ping.
pub const WEBHOOK_PING: &str = "ping";
/// Feed entry type for pull request events.
pub const FEED_PULL_REQUEST: &str = "PullRequestEvent";

/// Error type for payload decoding failures.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One entry of the upstream repository event feed, before decoding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedEvent {
    pub id: EventId,
    /// Entry type such as `PullRequestEvent` or `PushEvent`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Decodes a webhook delivery body.
///
/// # Examples
///
/// ```
/// use pr_mirror::webhooks::{PlatformEvent, parse_webhook};
///
/// let event = parse_webhook("ping", br#"{"zen": "Keep it logically awesome."}"#).unwrap();
/// assert_eq!(event, PlatformEvent::Ping);
///
/// let event = parse_webhook("push", b"{}").unwrap();
/// assert!(matches!(event, PlatformEvent::Unrecognized { .. }));
/// ```
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<PlatformEvent, DecodeError> {
    match event_type {
        WEBHOOK_PULL_REQUEST => {
            let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;
            Ok(PlatformEvent::PullRequest(raw.into_event()))
        }
        WEBHOOK_PING => Ok(PlatformEvent::Ping),
        other => Ok(PlatformEvent::Unrecognized {
            kind: other.to_string(),
        }),
    }
}

/// Decodes a feed entry's payload according to its type.
pub fn parse_feed_event(event: &FeedEvent) -> Result<PlatformEvent, DecodeError> {
    match event.kind.as_deref() {
        Some(FEED_PULL_REQUEST) => {
            let raw = RawPullRequestPayload::deserialize(&event.payload)?;
            Ok(PlatformEvent::PullRequest(raw.into_event()))
        }
        Some(other) => Ok(PlatformEvent::Unrecognized {
            kind: other.to_string(),
        }),
        None => Ok(PlatformEvent::Unrecognized {
            kind: String::new(),
        }),
    }
}

// ============================================================================
// Raw payload structures
//
// These follow the platform's JSON shape. Optional fields default rather than
// fail so that trimmed feed payloads still decode.
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    pull_request: RawPullRequest,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    #[serde(default)]
    title: String,
    body: Option<String>,
    user: Option<RawUser>,
    #[serde(default)]
    html_url: String,
    base: RawRef,
    merged: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawRef {
    #[serde(rename = "ref")]
    ref_name: String,
}

impl RawPullRequestPayload {
    fn into_event(self) -> PullRequestEvent {
        let pr = self.pull_request;
        PullRequestEvent {
            action: PrAction::from_wire(&self.action),
            number: PrNumber(pr.number),
            title: pr.title,
            body: pr.body.unwrap_or_default(),
            author: pr.user.map(|u| u.login).unwrap_or_default(),
            html_url: pr.html_url,
            base_branch: pr.base.ref_name,
            merged: pr.merged.unwrap_or(false),
        }
    }
}
