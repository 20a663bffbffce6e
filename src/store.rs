//! Option store seam and the in-memory option table behind the daemon.
//!
//! The lock controller only talks to `ConfigStore`. `MemoryStore` is the
//! concrete live-option table: typed declarations and current values. Every
//! value change is logged at debug level.
//!
//! Batch updates are best-effort: keys are applied in ascending order and the
//! first rejected key stops the batch, earlier keys stay applied.

use log::debug;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{ControlError, Result};
use crate::options::{OptionSpec, OptionTable, OptionValue, OverrideSet};

/// A live key-value option store.
///
/// `get` must return a value that a later `update` accepts for the same key.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Result<OptionValue>;
    fn update(&self, overrides: &OverrideSet) -> Result<()>;
}

struct OptionEntry {
    spec: OptionSpec,
    current: OptionValue,
}

/// Thread-safe in-memory option table.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, OptionEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with every option of `table` set to its default.
    pub fn from_table(table: OptionTable) -> Self {
        let store = Self::new();
        {
            let mut g = store.entries();
            for (key, spec) in table {
                let current = spec.default.clone();
                g.insert(key, OptionEntry { spec, current });
            }
        }
        store
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, OptionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Declare a new option at runtime.
    pub fn declare<K: Into<String>>(&self, key: K, spec: OptionSpec) -> anyhow::Result<()> {
        let key = key.into();
        let mut g = self.entries();
        if g.contains_key(&key) {
            return Err(anyhow::anyhow!("option '{}' declared twice", key));
        }
        spec.validate(&spec.default)
            .map_err(|f| anyhow::anyhow!("default of option '{}': {}", key, f))?;
        let current = spec.default.clone();
        g.insert(key, OptionEntry { spec, current });
        Ok(())
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    /// Current value of every option.
    pub fn snapshot(&self) -> OverrideSet {
        self.entries()
            .iter()
            .map(|(k, e)| (k.clone(), e.current.clone()))
            .collect()
    }

    /// Put `key` back to its declared default.
    pub fn reset(&self, key: &str) -> Result<()> {
        let mut g = self.entries();
        let e = g
            .get_mut(key)
            .ok_or_else(|| ControlError::unknown_option(key))?;
        let default = e.spec.default.clone();
        replace_value(key, e, default);
        Ok(())
    }
}

fn replace_value(key: &str, e: &mut OptionEntry, new: OptionValue) {
    if e.current != new {
        debug!("option {} = {} (was {})", key, new, e.current);
        e.current = new;
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Result<OptionValue> {
        self.entries()
            .get(key)
            .map(|e| e.current.clone())
            .ok_or_else(|| ControlError::unknown_option(key))
    }

    fn update(&self, overrides: &OverrideSet) -> Result<()> {
        let mut g = self.entries();
        for (key, value) in overrides {
            let e = g
                .get_mut(key)
                .ok_or_else(|| ControlError::unknown_option(key.as_str()))?;
            e.spec
                .validate(value)
                .map_err(|fault| ControlError::config(key.as_str(), fault))?;
            replace_value(key, e, value.clone());
        }
        Ok(())
    }
}
