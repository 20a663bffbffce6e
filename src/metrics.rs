//! Lightweight metrics for the option-lock controller and its endpoint.
//!
//! Relaxed atomic counters, one set per controller (no process-wide statics, so
//! every test controller starts from zero):
//! - lock / re-lock / failed lock
//! - effective unlock / no-op unlock / failed restore
//! - control requests / malformed requests

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ControlMetrics {
    locks_total: AtomicU64,
    lock_failures: AtomicU64,
    relocks_total: AtomicU64,
    unlocks_total: AtomicU64,
    unlock_noops: AtomicU64,
    unlock_failures: AtomicU64,
    requests_total: AtomicU64,
    malformed_requests: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub locks_total: u64,
    pub lock_failures: u64,
    pub relocks_total: u64,
    pub unlocks_total: u64,
    pub unlock_noops: u64,
    pub unlock_failures: u64,
    pub requests_total: u64,
    pub malformed_requests: u64,
}

impl ControlMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // ----- lock -----
    pub fn record_lock(&self) {
        self.locks_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_lock_failure(&self) {
        self.lock_failures.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_relock(&self) {
        self.relocks_total.fetch_add(1, Ordering::Relaxed);
    }

    // ----- unlock -----
    pub fn record_unlock(&self) {
        self.unlocks_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_unlock_noop(&self) {
        self.unlock_noops.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_unlock_failure(&self) {
        self.unlock_failures.fetch_add(1, Ordering::Relaxed);
    }

    // ----- endpoint -----
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_malformed(&self) {
        self.malformed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            locks_total: self.locks_total.load(Ordering::Relaxed),
            lock_failures: self.lock_failures.load(Ordering::Relaxed),
            relocks_total: self.relocks_total.load(Ordering::Relaxed),
            unlocks_total: self.unlocks_total.load(Ordering::Relaxed),
            unlock_noops: self.unlock_noops.load(Ordering::Relaxed),
            unlock_failures: self.unlock_failures.load(Ordering::Relaxed),
            requests_total: self.requests_total.load(Ordering::Relaxed),
            malformed_requests: self.malformed_requests.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Prometheus text exposition (format 0.0.4).
    pub fn to_prometheus(&self, active: bool, saved_keys: usize) -> String {
        let mut out = String::new();

        let ver = env!("CARGO_PKG_VERSION");
        push_metric(&mut out, "optlock_build_info", "gauge", "Build info.", None);
        let _ = writeln!(out, "optlock_build_info{{version=\"{}\"}} 1", ver);

        push_metric(&mut out, "optlock_lock_active", "gauge",
            "1 if an option lock is in effect.", Some(active as u64));
        push_metric(&mut out, "optlock_saved_options", "gauge",
            "Options with a saved pre-lock value.", Some(saved_keys as u64));

        // --- lock ---
        push_metric(&mut out, "optlock_locks_total", "counter",
            "Successful lock calls.", Some(self.locks_total));
        push_metric(&mut out, "optlock_lock_failures_total", "counter",
            "Failed lock calls.", Some(self.lock_failures));
        push_metric(&mut out, "optlock_relocks_total", "counter",
            "Locks that implicitly released a previous lock.", Some(self.relocks_total));

        // --- unlock ---
        push_metric(&mut out, "optlock_unlocks_total", "counter",
            "Unlocks that restored saved values.", Some(self.unlocks_total));
        push_metric(&mut out, "optlock_unlock_noops_total", "counter",
            "Unlock calls with no active lock.", Some(self.unlock_noops));
        push_metric(&mut out, "optlock_unlock_failures_total", "counter",
            "Restores rejected by the option store.", Some(self.unlock_failures));

        // --- endpoint ---
        push_metric(&mut out, "optlock_requests_total", "counter",
            "Control requests handled.", Some(self.requests_total));
        push_metric(&mut out, "optlock_malformed_requests_total", "counter",
            "Control requests rejected before reaching the controller.",
            Some(self.malformed_requests));

        out
    }
}

fn push_metric(out: &mut String, name: &str, ty: &str, help: &str, value: Option<u64>) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, ty);
    if let Some(v) = value {
        let _ = writeln!(out, "{} {}", name, v);
    }
}
