//! Atomic dispatch counters.
//!
//! All atomics use `Relaxed` ordering: these are monotonic display counters
//! with no synchronization requirements.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

#[derive(Default)]
struct StatsInner {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    switches: AtomicU64,
}

/// Thread-safe proxy statistics. Cheap to clone (Arc).
#[derive(Clone, Default)]
pub struct ProxyStats {
    inner: Arc<StatsInner>,
}

/// Snapshot of current stats values, serializable to JSON.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub switches: u64,
}

impl ProxyStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_dispatched(&self) {
        self.inner.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_succeeded(&self) {
        self.inner.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.inner.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_switches(&self) {
        self.inner.switches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dispatched: self.inner.dispatched.load(Ordering::Relaxed),
            succeeded: self.inner.succeeded.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            switches: self.inner.switches.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let stats = ProxyStats::new();
        let clone = stats.clone();
        stats.inc_dispatched();
        clone.inc_dispatched();
        clone.inc_failed();
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                dispatched: 2,
                succeeded: 0,
                failed: 1,
                switches: 0
            }
        );
    }
}
