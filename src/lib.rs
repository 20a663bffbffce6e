//! optlock: reversible live-option overrides for external test drivers.
//!
//! A driver POSTs `{"options": {...}}` to `/options/lock`; the controller
//! snapshots the current values of those options, applies the overrides and
//! restores the snapshot on `/options/unlock` or before the next lock.

// Option model and errors
pub mod error;
pub mod options;

// Live option store
pub mod store;

// Lock state machine
pub mod controller;
pub mod metrics;

// Control surface
pub mod config;
pub mod endpoint;
pub mod server;

pub use config::{ControlConfig, FileConfig};
pub use controller::{LockStatus, OptionLockController};
pub use error::{ConfigFault, ControlError};
pub use options::{OptionKind, OptionSpec, OptionTable, OptionValue, OverrideSet};
pub use server::{ControlServer, ServerHandle};
pub use store::{ConfigStore, MemoryStore};
