//! In-memory event store.
//!
//! Holds the same state as [`super::FileEventStore`] without touching disk.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use super::{EventStore, MirrorRecord, Result, StoreError};
use crate::types::{EventId, PrNumber};

#[derive(Debug, Default)]
struct Inner {
    seen: HashMap<EventId, DateTime<Utc>>,
    mirrors: BTreeMap<PrNumber, MirrorRecord>,
}

/// An event store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    inner: Mutex<Inner>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventStore for MemoryEventStore {
    fn has_seen(&self, event_id: &EventId) -> Result<bool> {
        Ok(self.lock().seen.contains_key(event_id))
    }

    fn mark_seen(&self, event_id: &EventId) -> Result<()> {
        self.lock()
            .seen
            .entry(event_id.clone())
            .or_insert_with(Utc::now);
        Ok(())
    }

    fn lookup_downstream(&self, upstream: PrNumber) -> Result<Option<PrNumber>> {
        Ok(self.lock().mirrors.get(&upstream).map(|r| r.downstream))
    }

    fn mirror_record(&self, upstream: PrNumber) -> Result<Option<MirrorRecord>> {
        Ok(self.lock().mirrors.get(&upstream).cloned())
    }

    fn record_mapping(&self, downstream: PrNumber, upstream: PrNumber) -> Result<()> {
        let mut inner = self.lock();
        if let Some(existing) = inner.mirrors.get(&upstream) {
            return Err(StoreError::MappingExists {
                upstream,
                existing: existing.downstream,
            });
        }
        inner.mirrors.insert(
            upstream,
            MirrorRecord {
                upstream,
                downstream,
                mirrored_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn mapping_count(&self) -> Result<usize> {
        Ok(self.lock().mirrors.len())
    }

    fn seen_count(&self) -> Result<usize> {
        Ok(self.lock().seen.len())
    }
}
