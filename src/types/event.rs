//! The canonical merge fact that drives a mirror attempt.

use serde::{Deserialize, Serialize};

use super::ids::{EventId, PrNumber};

/// Action performed on a pull request.
///
/// Only `Closed` matters for mirroring; the rest are kept so the filter can
/// report what it discarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrAction {
    Opened,
    Closed,
    Reopened,
    Edited,
    Synchronize,
    /// Any action we have no special handling for (labeled, assigned, ...).
    Other(String),
}

impl PrAction {
    /// Maps the platform's action string onto a `PrAction`.
    pub fn from_wire(action: &str) -> Self {
        match action {
            "opened" => PrAction::Opened,
            "closed" => PrAction::Closed,
            "reopened" => PrAction::Reopened,
            "edited" => PrAction::Edited,
            "synchronize" => PrAction::Synchronize,
            other => PrAction::Other(other.to_string()),
        }
    }

    /// Returns the platform's action string.
    pub fn as_str(&self) -> &str {
        match self {
            PrAction::Opened => "opened",
            PrAction::Closed => "closed",
            PrAction::Reopened => "reopened",
            PrAction::Edited => "edited",
            PrAction::Synchronize => "synchronize",
            PrAction::Other(s) => s,
        }
    }
}

/// A merged upstream pull request that passed the merge filter.
///
/// Constructed only by [`crate::filter::MergeFilter`]; fields are read-only
/// after that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalMergeEvent {
    /// The upstream PR number.
    pub number: PrNumber,
    pub title: String,
    /// PR description. Empty when the PR had none.
    pub body: String,
    /// Login of the PR author.
    pub author: String,
    /// Browser URL of the upstream PR.
    pub html_url: String,
    pub base_branch: String,
    pub merged: bool,
    pub action: PrAction,
    /// Feed entry this event came from. `None` for webhook deliveries.
    pub event_id: Option<EventId>,
}
