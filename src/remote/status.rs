//! Last-known backend status. Written by the prober and by every read
//! through `BackendClient`, read synchronously by the UI.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub is_healthy: bool,
    pub check_completed: bool,
    /// Epoch milliseconds of the last update (0 = never).
    pub last_checked_ms: u64,
}

pub struct BackendStatus {
    healthy: AtomicBool,
    check_completed: AtomicBool,
    last_checked_ms: AtomicU64,
}

impl BackendStatus {
    /// Starts out assuming a healthy backend with no check done yet.
    pub fn new() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            check_completed: AtomicBool::new(false),
            last_checked_ms: AtomicU64::new(0),
        }
    }

    /// Record the outcome of a probe.
    pub fn record_check(&self, healthy: bool, at_ms: u64) {
        self.healthy.store(healthy, Ordering::Relaxed);
        self.check_completed.store(true, Ordering::Relaxed);
        self.last_checked_ms.store(at_ms, Ordering::Relaxed);
    }

    /// Record the outcome of an ordinary read. Does not count as a check.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn check_completed(&self) -> bool {
        self.check_completed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            is_healthy: self.is_healthy(),
            check_completed: self.check_completed(),
            last_checked_ms: self.last_checked_ms.load(Ordering::Relaxed),
        }
    }
}

impl Default for BackendStatus {
    fn default() -> Self {
        Self::new()
    }
}
