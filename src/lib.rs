//! PR Mirror - replays merged upstream pull requests into a downstream
//! repository.
//!
//! Merges are detected through two channels (polling the upstream event feed
//! and receiving webhooks), filtered down to merged pull requests into the
//! target branch, and handed to a [`mirror::Mirrorer`] that runs the external
//! merge tool and opens the matching downstream pull request.

pub mod config;
pub mod filter;
pub mod github;
pub mod mirror;
pub mod poller;
pub mod server;
pub mod store;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;
