//! Centralized configuration for the option-lock control server.
//!
//! Sources, highest priority first:
//! - CLI flags (applied by the daemon through the `with_*` setters)
//! - TOML config file (`FileConfig`, merged by `ControlConfig::merge_file`)
//! - environment (`ControlConfig::from_env`)
//! - defaults
//!
//! Environment:
//! - OPTLOCK_ADDR                 listen address (default 127.0.0.1:8089)
//! - OPTLOCK_WORKERS              request worker threads (default 4, min 1)
//! - OPTLOCK_HOST                 reserved control hostname (default: accept any Host)
//! - OPTLOCK_MAX_BODY_BYTES       request body cap (default 1 MiB)
//! - OPTLOCK_OPTIONS_FILE         JSON option table to serve
//! - OPTLOCK_UNLOCK_ON_SHUTDOWN   "1|true|on|yes" (default true)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8089";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_MAX_BODY_BYTES: usize = 1 << 20;

#[derive(Clone, Debug, PartialEq)]
pub struct ControlConfig {
    /// Address the control server binds to. Port 0 picks a free port.
    pub listen_addr: String,

    /// Number of threads pulling requests off the server.
    pub workers: usize,

    /// If set, only requests addressed to this host are served; others get 404.
    pub control_host: Option<String>,

    /// Larger request bodies are rejected with 413.
    pub max_body_bytes: usize,

    /// JSON option table loaded into the in-memory store.
    pub options_file: Option<PathBuf>,

    /// Restore locked options on `ServerHandle::shutdown`
    /// (`optlockd serve --until-stdin-eof` when stdin closes).
    pub unlock_on_shutdown: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            workers: DEFAULT_WORKERS,
            control_host: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            options_file: None,
            unlock_on_shutdown: true,
        }
    }
}

fn parse_flag(s: &str) -> bool {
    let s = s.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "on" || s == "yes"
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

impl ControlConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("OPTLOCK_ADDR").as_deref().and_then(non_empty) {
            cfg.listen_addr = v;
        }
        if let Some(v) = lookup("OPTLOCK_WORKERS") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.workers = n.max(1);
            }
        }
        if let Some(v) = lookup("OPTLOCK_HOST") {
            cfg.control_host = non_empty(&v);
        }
        if let Some(v) = lookup("OPTLOCK_MAX_BODY_BYTES") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.max_body_bytes = n;
            }
        }
        if let Some(v) = lookup("OPTLOCK_OPTIONS_FILE").as_deref().and_then(non_empty) {
            cfg.options_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("OPTLOCK_UNLOCK_ON_SHUTDOWN") {
            cfg.unlock_on_shutdown = parse_flag(&v);
        }

        cfg
    }

    /// Overlay every value present in `file`.
    pub fn merge_file(mut self, file: &FileConfig) -> Self {
        if let Some(v) = &file.listen {
            self.listen_addr = v.clone();
        }
        if let Some(n) = file.workers {
            self.workers = n.max(1);
        }
        if let Some(v) = &file.control_host {
            self.control_host = non_empty(v);
        }
        if let Some(n) = file.max_body_bytes {
            self.max_body_bytes = n;
        }
        if let Some(p) = &file.options_file {
            self.options_file = Some(p.clone());
        }
        if let Some(on) = file.unlock_on_shutdown {
            self.unlock_on_shutdown = on;
        }
        self
    }

    pub fn with_listen_addr<S: Into<String>>(mut self, addr: S) -> Self {
        self.listen_addr = addr.into();
        self
    }

    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }

    pub fn with_control_host<S: Into<String>>(mut self, host: Option<S>) -> Self {
        self.control_host = host.map(Into::into);
        self
    }

    pub fn with_max_body_bytes(mut self, n: usize) -> Self {
        self.max_body_bytes = n;
        self
    }

    pub fn with_options_file<P: Into<PathBuf>>(mut self, path: Option<P>) -> Self {
        self.options_file = path.map(Into::into);
        self
    }

    pub fn with_unlock_on_shutdown(mut self, on: bool) -> Self {
        self.unlock_on_shutdown = on;
        self
    }

    pub fn build(self) -> Self {
        self
    }
}

impl fmt::Display for ControlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ControlConfig {{ \
             listen_addr: {}, \
             workers: {}, \
             control_host: {}, \
             max_body_bytes: {}, \
             options_file: {}, \
             unlock_on_shutdown: {} \
             }}",
            self.listen_addr,
            self.workers,
            self.control_host.as_deref().unwrap_or("any"),
            self.max_body_bytes,
            self.options_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.unlock_on_shutdown,
        )
    }
}

/// On-disk daemon config (TOML). Every field is optional.
///
/// ```toml
/// listen = "0.0.0.0:8089"
/// workers = 2
/// control_host = "mitm.code"
/// options_file = "options.json"
/// ```
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub listen: Option<String>,
    pub workers: Option<usize>,
    pub control_host: Option<String>,
    pub max_body_bytes: Option<usize>,
    pub options_file: Option<PathBuf>,
    pub unlock_on_shutdown: Option<bool>,
}

impl FileConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parse TOML config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&s)?;
        // relative option tables resolve against the config file's directory
        if let (Some(p), Some(dir)) = (cfg.options_file.as_ref(), path.parent()) {
            if p.is_relative() {
                cfg.options_file = Some(dir.join(p));
            }
        }
        Ok(cfg)
    }
}
