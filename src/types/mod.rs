//! Core domain types for the PR mirror.

pub mod event;
pub mod ids;

pub use event::{CanonicalMergeEvent, PrAction};
pub use ids::{EventId, InvalidRepoId, PrNumber, RepoId};
