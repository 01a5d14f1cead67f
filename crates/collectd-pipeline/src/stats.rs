// SPDX-License-Identifier: Apache-2.0

//! Delivery accounting for one writer instance.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic delivery counters, shared between the batch loop and the
/// metrics scrape endpoint. Not consumed internally.
#[derive(Debug, Default)]
pub struct WriterStats {
    events: AtomicU64,
    requests_ok: AtomicU64,
    requests_failed: AtomicU64,
    events_dropped: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub events: u64,
    pub requests_ok: u64,
    pub requests_failed: u64,
    pub events_dropped: u64,
}

impl WriterStats {
    pub fn add_events(&self, n: u64) {
        self.events.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr_requests_ok(&self) {
        self.requests_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_requests_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_events_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events: self.events.load(Ordering::Relaxed),
            requests_ok: self.requests_ok.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = WriterStats::default();
        stats.add_events(1000);
        stats.add_events(500);
        stats.incr_requests_ok();
        stats.incr_requests_failed();
        stats.incr_events_dropped();

        let snap = stats.snapshot();
        assert_eq!(snap.events, 1500);
        assert_eq!(snap.requests_ok, 1);
        assert_eq!(snap.requests_failed, 1);
        assert_eq!(snap.events_dropped, 1);
    }
}
