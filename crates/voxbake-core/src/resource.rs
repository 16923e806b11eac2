//! Accounting for device allocations made during a sweep.
//!
//! Every capture buffer, volume buffer and scratch buffer holds an
//! [`AllocationGuard`]. Dropping the owner releases the guard, so every exit
//! path (including `?` returns) gives the allocation back.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    live: AtomicUsize,
    total: AtomicUsize,
}

/// Shared counter of live device allocations.
#[derive(Debug, Clone, Default)]
pub struct AllocationTracker {
    counters: Arc<Counters>,
}

impl AllocationTracker {
    /// Creates a tracker with no live allocations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new allocation; it stays live until the guard is dropped.
    #[must_use]
    pub fn acquire(&self, label: &'static str) -> AllocationGuard {
        let live = self.counters.live.fetch_add(1, Ordering::AcqRel) + 1;
        self.counters.total.fetch_add(1, Ordering::Relaxed);
        log::trace!("acquired {label} ({live} live)");
        AllocationGuard {
            counters: Arc::clone(&self.counters),
            label,
        }
    }

    /// Number of allocations not yet released.
    pub fn outstanding(&self) -> usize {
        self.counters.live.load(Ordering::Acquire)
    }

    /// Number of allocations ever made through this tracker.
    pub fn total_allocated(&self) -> usize {
        self.counters.total.load(Ordering::Relaxed)
    }
}

/// Scoped handle for one live allocation.
#[derive(Debug)]
pub struct AllocationGuard {
    counters: Arc<Counters>,
    label: &'static str,
}

impl AllocationGuard {
    /// Label given when the allocation was acquired.
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl Drop for AllocationGuard {
    fn drop(&mut self) {
        let live = self.counters.live.fetch_sub(1, Ordering::AcqRel) - 1;
        log::trace!("released {} ({live} live)", self.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards_release_on_drop() {
        let tracker = AllocationTracker::new();
        let a = tracker.acquire("a");
        {
            let _b = tracker.acquire("b");
            assert_eq!(tracker.outstanding(), 2);
        }
        assert_eq!(tracker.outstanding(), 1);
        assert_eq!(a.label(), "a");
        drop(a);
        assert_eq!(tracker.outstanding(), 0);
        assert_eq!(tracker.total_allocated(), 2);
    }

    #[test]
    fn test_clones_share_counts() {
        let tracker = AllocationTracker::new();
        let other = tracker.clone();
        let _guard = other.acquire("shared");
        assert_eq!(tracker.outstanding(), 1);
    }

    #[test]
    fn test_release_on_early_return() {
        fn fails(tracker: &AllocationTracker) -> Result<(), ()> {
            let _capture = tracker.acquire("capture");
            Err(())
        }
        let tracker = AllocationTracker::new();
        assert!(fails(&tracker).is_err());
        assert_eq!(tracker.outstanding(), 0);
    }
}
