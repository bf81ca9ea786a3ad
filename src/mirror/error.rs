use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::github::GitHubApiError;
use crate::store::StoreError;
use crate::types::PrNumber;

/// Why a mirror attempt produced no tracked downstream pull request.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// A mapping already exists; nothing was done.
    #[error("upstream PR {upstream} is already mirrored as {downstream}")]
    AlreadyMirrored {
        upstream: PrNumber,
        downstream: PrNumber,
    },

    #[error("merge tool failed for upstream PR {pr} (exit code {exit_code:?})")]
    ToolFailed {
        pr: PrNumber,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("merge tool timed out for upstream PR {pr} after {after:?}")]
    ToolTimedOut { pr: PrNumber, after: Duration },

    #[error("failed to start merge tool for upstream PR {pr}: {source}")]
    ToolSpawn {
        pr: PrNumber,
        #[source]
        source: io::Error,
    },

    /// The tool pushed `head_branch` but the pull request was not opened.
    /// The branch is left behind for an operator.
    #[error("failed to open downstream PR from branch {head_branch}: {source}")]
    PlatformCreateFailed {
        head_branch: String,
        #[source]
        source: GitHubApiError,
    },

    #[error("event store error: {0}")]
    Storage(#[from] StoreError),

    /// The downstream PR exists but its mapping could not be written. The
    /// operator has to record `upstream -> downstream` by hand.
    #[error("downstream PR {downstream} opened for upstream PR {upstream} but the mapping was not recorded: {source}")]
    MappingNotRecorded {
        upstream: PrNumber,
        downstream: PrNumber,
        #[source]
        source: StoreError,
    },
}

impl MirrorError {
    /// True for failures a later attempt could get past without opening a
    /// second downstream PR. An existing mapping is final, and so is a PR
    /// opened without one.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            MirrorError::AlreadyMirrored { .. } | MirrorError::MappingNotRecorded { .. }
        )
    }
}
