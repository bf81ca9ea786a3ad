//! GitHub API client.
//!
//! [`PlatformClient`] is the seam the mirror depends on; [`OctocrabClient`]
//! implements it with the octocrab library.

mod client;
mod error;
mod platform;

pub use client::OctocrabClient;
pub use error::GitHubApiError;
pub use platform::{EventFeedPage, NewPullRequest, PlatformClient};
