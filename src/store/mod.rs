//! Event store: seen feed events and upstream-to-downstream mirror mappings.
//!
//! The store is the single source of truth for idempotency. Two facts are
//! kept:
//!
//! - **Seen events**: feed event ids the poller has handled. Append-only; an
//!   id is never removed once recorded.
//! - **Mirror mappings**: upstream PR number to downstream PR number. At most
//!   one mapping per upstream PR, written once and never updated.
//!
//! Callers never cache either fact across mirror attempts; every decision
//! re-reads the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{EventId, PrNumber};

pub mod file;
pub mod memory;

pub use file::FileEventStore;
pub use memory::MemoryEventStore;

/// Errors returned by event store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The upstream PR already has a downstream mapping.
    #[error("upstream PR {upstream} is already mirrored as {existing}")]
    MappingExists {
        upstream: PrNumber,
        existing: PrNumber,
    },

    /// IO error reading or writing the backing file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backing file was written by an incompatible version.
    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// A recorded mirror of one upstream PR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRecord {
    pub upstream: PrNumber,
    pub downstream: PrNumber,
    pub mirrored_at: DateTime<Utc>,
}

/// Persistence contract for seen events and mirror mappings.
///
/// Implementations must be safe to share between the poller task and HTTP
/// handlers.
pub trait EventStore: Send + Sync {
    /// Returns whether a feed event has already been handled.
    ///
    /// An unknown id is `Ok(false)`, never an error.
    fn has_seen(&self, event_id: &EventId) -> Result<bool>;

    /// Records a feed event as handled. Marking twice is a no-op.
    fn mark_seen(&self, event_id: &EventId) -> Result<()>;

    /// Records several feed events as handled in one step. Ids already seen
    /// keep their original timestamp.
    fn mark_seen_many(&self, event_ids: &[EventId]) -> Result<()> {
        event_ids.iter().try_for_each(|id| self.mark_seen(id))
    }

    /// Returns the downstream PR recorded for an upstream PR, if any.
    fn lookup_downstream(&self, upstream: PrNumber) -> Result<Option<PrNumber>>;

    /// Returns the full mapping record for an upstream PR, if any.
    fn mirror_record(&self, upstream: PrNumber) -> Result<Option<MirrorRecord>>;

    /// Records that `upstream` was mirrored as `downstream`.
    ///
    /// Fails with [`StoreError::MappingExists`] if `upstream` already has a
    /// mapping; the existing mapping is left untouched.
    fn record_mapping(&self, downstream: PrNumber, upstream: PrNumber) -> Result<()>;

    /// Number of recorded mirror mappings.
    fn mapping_count(&self) -> Result<usize>;

    /// Number of seen feed events.
    fn seen_count(&self) -> Result<usize>;
}

/// Checks whether a feed event was already handled, treating storage
/// failures as "not seen".
///
/// A revisited event is stopped by the mirrorer's mapping check.
pub fn has_seen_or_warn<S: EventStore + ?Sized>(store: &S, event_id: &EventId) -> bool {
    match store.has_seen(event_id) {
        Ok(seen) => seen,
        Err(e) => {
            tracing::warn!(
                event_id = %event_id,
                error = %e,
                "Seen-event lookup failed; treating event as unseen"
            );
            false
        }
    }
}
