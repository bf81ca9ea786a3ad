//! Mutual-exclusion gate around the shared repository checkout.
//!
//! The merge tool mutates one working copy, so at most one mirror attempt may
//! run between tool start and mapping record. The gate is an async mutex: a
//! waiting task yields instead of blocking a runtime thread.

use tokio::sync::{Mutex, MutexGuard};

/// The lock serializing every operation on the shared checkout.
///
/// Not reentrant: acquiring twice from the same task deadlocks.
#[derive(Debug, Default)]
pub struct MirrorGate {
    lock: Mutex<()>,
}

/// Proof of holding the [`MirrorGate`]. Released on drop, including during
/// unwinding.
#[derive(Debug)]
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct GateGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl MirrorGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the gate is free, then holds it until the guard drops.
    pub async fn acquire(&self) -> GateGuard<'_> {
        GateGuard {
            _guard: self.lock.lock().await,
        }
    }

    /// Takes the gate only if nobody holds it.
    pub fn try_acquire(&self) -> Option<GateGuard<'_>> {
        self.lock
            .try_lock()
            .ok()
            .map(|guard| GateGuard { _guard: guard })
    }
}
