//! File-backed event store.
//!
//! The whole store is one JSON document at `<state_dir>/pr-mirror-state.json`.
//! It is small (one entry per feed event and per mirrored PR) so every
//! mutation rewrites it.
//!
//! # Atomic Writes
//!
//! Each write uses the write-to-temp-then-rename pattern:
//! 1. Write to `pr-mirror-state.json.tmp`
//! 2. fsync the file
//! 3. Rename over `pr-mirror-state.json`
//! 4. fsync the directory
//!
//! Readers always see either the old or the new document. If any step fails
//! the in-memory view is left as it was before the mutation, so memory never
//! runs ahead of disk.

use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EventStore, MirrorRecord, Result, StoreError};
use crate::types::{EventId, PrNumber};

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// File name of the store document inside the state directory.
pub const STATE_FILE_NAME: &str = "pr-mirror-state.json";

/// On-disk representation of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub schema_version: u32,

    /// When the document was last written.
    pub updated_at: DateTime<Utc>,

    /// Feed event ids with the time they were first marked seen.
    pub seen_events: HashMap<EventId, DateTime<Utc>>,

    /// Mirror mappings keyed by upstream PR number.
    pub mirrors: BTreeMap<PrNumber, MirrorRecord>,
}

impl StoreSnapshot {
    pub fn new() -> Self {
        StoreSnapshot {
            schema_version: SCHEMA_VERSION,
            updated_at: Utc::now(),
            seen_events: HashMap::new(),
            mirrors: BTreeMap::new(),
        }
    }
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Event store persisted to a single JSON file.
#[derive(Debug)]
pub struct FileEventStore {
    path: PathBuf,
    state: Mutex<StoreSnapshot>,
}

impl FileEventStore {
    /// Opens the store in `state_dir`, creating the directory if needed.
    ///
    /// A missing state file yields an empty store; the file is created on the
    /// first mutation.
    pub fn open(state_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_dir)?;
        let path = state_dir.join(STATE_FILE_NAME);
        let state = try_load_snapshot(&path)?.unwrap_or_default();

        tracing::debug!(
            path = %path.display(),
            mirrors = state.mirrors.len(),
            seen_events = state.seen_events.len(),
            "Opened event store"
        );

        Ok(FileEventStore {
            path,
            state: Mutex::new(state),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, StoreSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `mutate` to a copy of the state, persists it, then publishes it.
    fn commit(
        &self,
        guard: &mut MutexGuard<'_, StoreSnapshot>,
        mutate: impl FnOnce(&mut StoreSnapshot),
    ) -> Result<()> {
        let mut next = (**guard).clone();
        mutate(&mut next);
        next.updated_at = Utc::now();
        save_snapshot_atomic(&self.path, &next)?;
        **guard = next;
        Ok(())
    }
}

impl EventStore for FileEventStore {
    fn has_seen(&self, event_id: &EventId) -> Result<bool> {
        Ok(self.lock().seen_events.contains_key(event_id))
    }

    fn mark_seen(&self, event_id: &EventId) -> Result<()> {
        let mut guard = self.lock();
        if guard.seen_events.contains_key(event_id) {
            return Ok(());
        }
        self.commit(&mut guard, |state| {
            state.seen_events.insert(event_id.clone(), Utc::now());
        })
    }

    /// One snapshot write for the whole batch, and none if every id is
    /// already seen.
    fn mark_seen_many(&self, event_ids: &[EventId]) -> Result<()> {
        let mut guard = self.lock();
        let fresh: Vec<&EventId> = event_ids
            .iter()
            .filter(|id| !guard.seen_events.contains_key(*id))
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }
        self.commit(&mut guard, |state| {
            let now = Utc::now();
            for id in fresh {
                state.seen_events.entry(id.clone()).or_insert(now);
            }
        })
    }

    fn lookup_downstream(&self, upstream: PrNumber) -> Result<Option<PrNumber>> {
        Ok(self.lock().mirrors.get(&upstream).map(|r| r.downstream))
    }

    fn mirror_record(&self, upstream: PrNumber) -> Result<Option<MirrorRecord>> {
        Ok(self.lock().mirrors.get(&upstream).cloned())
    }

    fn record_mapping(&self, downstream: PrNumber, upstream: PrNumber) -> Result<()> {
        let mut guard = self.lock();
        if let Some(existing) = guard.mirrors.get(&upstream) {
            return Err(StoreError::MappingExists {
                upstream,
                existing: existing.downstream,
            });
        }
        self.commit(&mut guard, |state| {
            state.mirrors.insert(
                upstream,
                MirrorRecord {
                    upstream,
                    downstream,
                    mirrored_at: Utc::now(),
                },
            );
        })
    }

    fn mapping_count(&self) -> Result<usize> {
        Ok(self.lock().mirrors.len())
    }

    fn seen_count(&self) -> Result<usize> {
        Ok(self.lock().seen_events.len())
    }
}

/// Saves a snapshot atomically to disk.
///
/// # Errors
///
/// Returns an error if any IO operation fails.
pub fn save_snapshot_atomic(path: &Path, snapshot: &StoreSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(snapshot)?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }

    std::fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent() {
        fsync_dir(parent)?;
    }

    Ok(())
}

/// Loads a snapshot, returning `None` if the file doesn't exist.
///
/// Malformed JSON and schema mismatches are errors.
pub fn try_load_snapshot(path: &Path) -> Result<Option<StoreSnapshot>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)?;
    if snapshot.schema_version != SCHEMA_VERSION {
        return Err(StoreError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            got: snapshot.schema_version,
        });
    }

    Ok(Some(snapshot))
}

/// Syncs a directory so a rename inside it survives power loss.
fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    File::open(dir_path)?.sync_all()
}
