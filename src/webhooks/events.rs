//! Decoded platform events.
//!
//! Both ingestion channels (webhook deliveries and the repository event feed)
//! decode into [`PlatformEvent`]. The set of kinds is closed; anything we do
//! not act on lands in [`PlatformEvent::Unrecognized`] so callers match
//! exhaustively instead of downcasting.

use serde::{Deserialize, Serialize};

use crate::types::{PrAction, PrNumber};

/// A decoded event from either ingestion channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformEvent {
    /// A pull request lifecycle change.
    PullRequest(PullRequestEvent),

    /// The platform's "webhook configured" ping.
    Ping,

    /// Any other event kind. Carries the kind name for logging.
    Unrecognized { kind: String },
}

impl PlatformEvent {
    /// Short name of the event kind, for logs.
    pub fn kind(&self) -> &str {
        match self {
            PlatformEvent::PullRequest(_) => "pull_request",
            PlatformEvent::Ping => "ping",
            PlatformEvent::Unrecognized { kind } => kind,
        }
    }
}

/// A pull request event with the fields the mirror needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub action: PrAction,
    pub number: PrNumber,
    pub title: String,
    /// PR description; empty if the PR has none.
    pub body: String,
    pub author: String,
    pub html_url: String,
    pub base_branch: String,
    /// Whether the PR was merged. Only meaningful for `closed`.
    pub merged: bool,
}
