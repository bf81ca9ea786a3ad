//! Merge filter: turns decoded platform events into canonical merge events.
//!
//! Rules, applied in order:
//!
//! | Rule | Discarded as |
//! |------|--------------|
//! | event is a pull request event | [`Discarded::NotPullRequest`] |
//! | action is `closed` | [`Discarded::NotClosed`] |
//! | PR was merged | [`Discarded::NotMerged`] |
//! | base branch is the target branch | [`Discarded::WrongBase`] |
//!
//! The filter is pure. Decoding errors are raised earlier by the parser and
//! never reach it.

use std::fmt;

use crate::types::{CanonicalMergeEvent, EventId, PrAction, PrNumber};
use crate::webhooks::PlatformEvent;

/// Why an event was not forwarded to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discarded {
    NotPullRequest { kind: String },
    NotClosed { pr: PrNumber, action: PrAction },
    NotMerged { pr: PrNumber },
    WrongBase { pr: PrNumber, base: String },
}

impl fmt::Display for Discarded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discarded::NotPullRequest { kind } => write!(f, "not a pull request event ({kind})"),
            Discarded::NotClosed { pr, action } => {
                write!(f, "PR {pr} action is {}", action.as_str())
            }
            Discarded::NotMerged { pr } => write!(f, "PR {pr} was closed without merging"),
            Discarded::WrongBase { pr, base } => write!(f, "PR {pr} targets {base}"),
        }
    }
}

/// Accepts merged pull requests into one target branch.
#[derive(Debug, Clone)]
pub struct MergeFilter {
    target_branch: String,
}

impl MergeFilter {
    pub fn new(target_branch: impl Into<String>) -> Self {
        MergeFilter {
            target_branch: target_branch.into(),
        }
    }

    pub fn target_branch(&self) -> &str {
        &self.target_branch
    }

    /// Applies the filter rules.
    ///
    /// `event_id` is the originating feed entry, or `None` for webhook
    /// deliveries.
    pub fn normalize(
        &self,
        event: PlatformEvent,
        event_id: Option<EventId>,
    ) -> Result<CanonicalMergeEvent, Discarded> {
        let pr = match event {
            PlatformEvent::PullRequest(pr) => pr,
            PlatformEvent::Ping => {
                return Err(Discarded::NotPullRequest {
                    kind: "ping".to_string(),
                });
            }
            PlatformEvent::Unrecognized { kind } => {
                return Err(Discarded::NotPullRequest { kind });
            }
        };

        if pr.action != PrAction::Closed {
            return Err(Discarded::NotClosed {
                pr: pr.number,
                action: pr.action,
            });
        }
        if !pr.merged {
            return Err(Discarded::NotMerged { pr: pr.number });
        }
        if pr.base_branch != self.target_branch {
            return Err(Discarded::WrongBase {
                pr: pr.number,
                base: pr.base_branch,
            });
        }

        Ok(CanonicalMergeEvent {
            number: pr.number,
            title: pr.title,
            body: pr.body,
            author: pr.author,
            html_url: pr.html_url,
            base_branch: pr.base_branch,
            merged: pr.merged,
            action: pr.action,
            event_id,
        })
    }
}
