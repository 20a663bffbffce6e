//! Option-lock state machine.
//!
//! UNLOCKED --lock(o)--> LOCKED --unlock()--> UNLOCKED
//! LOCKED --lock(o2)--> LOCKED   (implicit unlock first, then lock)
//!
//! A lock snapshots the current value of every key it is about to override,
//! then applies the overrides as one batch. Unlock writes the snapshot back.
//! There is a single snapshot, never a stack: re-locking restores the previous
//! snapshot before taking a new one.
//!
//! `lock` and `unlock` each run as one critical section over the snapshot
//! state and every store call they make.

use log::{info, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::metrics::ControlMetrics;
use crate::options::OverrideSet;
use crate::store::ConfigStore;

/// `saved` is empty whenever `active` is false.
#[derive(Debug, Clone, Default, PartialEq)]
struct SnapshotState {
    active: bool,
    saved: OverrideSet,
}

/// Point-in-time copy of the controller state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LockStatus {
    pub active: bool,
    /// Pre-lock value of every overridden key.
    pub saved: OverrideSet,
}

pub struct OptionLockController {
    store: Arc<dyn ConfigStore>,
    state: Mutex<SnapshotState>,
    metrics: ControlMetrics,
}

impl OptionLockController {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            state: Mutex::new(SnapshotState::default()),
            metrics: ControlMetrics::new(),
        }
    }

    // The snapshot is recorded before the store is written and cleared only
    // after a restore succeeds, so a guard poisoned by a panicking store still
    // covers every override that may have reached it.
    fn state(&self) -> MutexGuard<'_, SnapshotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn metrics(&self) -> &ControlMetrics {
        &self.metrics
    }

    pub fn status(&self) -> LockStatus {
        let st = self.state();
        LockStatus {
            active: st.active,
            saved: st.saved.clone(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state().active
    }

    /// Override `overrides`, remembering the current values for `unlock`.
    ///
    /// An active lock is released first. If that restore fails the old lock
    /// stays in place and its error is returned.
    ///
    /// Reads happen before any write, so a rejected read (e.g. unknown
    /// option) leaves the store untouched and the controller unlocked.
    /// A rejected write is best-effort: keys already applied stay applied and
    /// remain in the snapshot, so `unlock` still restores them.
    pub fn lock(&self, overrides: &OverrideSet) -> Result<()> {
        let mut st = self.state();

        if st.active {
            self.restore(&mut st).map_err(|e| {
                self.metrics.record_lock_failure();
                e
            })?;
            self.metrics.record_relock();
        }

        let mut saved = OverrideSet::new();
        for key in overrides.keys() {
            match self.store.get(key) {
                Ok(v) => {
                    saved.insert(key.clone(), v);
                }
                Err(e) => {
                    self.metrics.record_lock_failure();
                    return Err(e);
                }
            }
        }

        info!("locking options {}", render(overrides));
        st.saved = saved;
        st.active = true;
        if let Err(e) = self.store.update(overrides) {
            self.metrics.record_lock_failure();
            let applied = self.applied_subset(std::mem::take(&mut st.saved));
            if applied.is_empty() {
                warn!("lock rejected before any option changed: {}", e);
                st.active = false;
            } else {
                warn!(
                    "lock partially applied ({}), kept for unlock: {}",
                    applied.keys().cloned().collect::<Vec<_>>().join(", "),
                    e
                );
                st.saved = applied;
            }
            return Err(e);
        }

        self.metrics.record_lock();
        Ok(())
    }

    /// Restore the values saved by the active lock. No-op when unlocked.
    ///
    /// A failed restore keeps the lock and its snapshot so the call can be
    /// retried.
    pub fn unlock(&self) -> Result<()> {
        let mut st = self.state();
        if !st.active {
            self.metrics.record_unlock_noop();
            return Ok(());
        }
        self.restore(&mut st)
    }

    fn restore(&self, st: &mut SnapshotState) -> Result<()> {
        info!("unlocking options back to {}", render(&st.saved));
        if let Err(e) = self.store.update(&st.saved) {
            warn!("restore failed, lock kept: {}", e);
            self.metrics.record_unlock_failure();
            return Err(e);
        }
        st.saved.clear();
        st.active = false;
        self.metrics.record_unlock();
        Ok(())
    }

    // Keys of `saved` whose live value no longer matches the snapshot.
    // Unreadable keys are kept: restoring them is the safe side.
    fn applied_subset(&self, saved: OverrideSet) -> OverrideSet {
        saved
            .into_iter()
            .filter(|(k, before)| match self.store.get(k) {
                Ok(now) => &now != before,
                Err(_) => true,
            })
            .collect()
    }
}

fn render(set: &OverrideSet) -> String {
    serde_json::to_string(set).unwrap_or_else(|_| format!("{:?}", set))
}
