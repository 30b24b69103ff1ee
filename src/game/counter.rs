//! Bounded concurrency counter
//!
//! Tracks how many game sessions are running against the configured ceiling.
//! All mutations are compare-and-update transactions with an explicit
//! success/failure result; the count can never exceed the maximum.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Atomically-updated counter bounded in `[0, max]`
#[derive(Debug)]
pub struct GameCounter {
    max: usize,
    count: AtomicUsize,
}

impl GameCounter {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            count: AtomicUsize::new(0),
        }
    }

    /// Claim one slot; fails when the ceiling is already reached
    pub fn try_increment(&self) -> bool {
        self.count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < self.max).then_some(current + 1)
            })
            .is_ok()
    }

    /// Release one slot
    pub fn decrement(&self) {
        self.count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_sub(1)
            })
            .ok();
    }

    /// Whether `reserved` additional slots would meet or exceed the ceiling
    pub fn is_max(&self, reserved: usize) -> bool {
        self.count.load(Ordering::SeqCst) + reserved >= self.max
    }

    /// Number of claimed slots
    pub fn active(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Configured ceiling
    pub fn max(&self) -> usize {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_respects_ceiling() {
        let counter = GameCounter::new(2);
        assert!(counter.try_increment());
        assert!(counter.try_increment());
        assert!(!counter.try_increment());
        assert_eq!(counter.active(), 2);
    }

    #[test]
    fn test_decrement_frees_a_slot() {
        let counter = GameCounter::new(1);
        assert!(counter.try_increment());
        counter.decrement();
        assert!(counter.try_increment());
    }

    #[test]
    fn test_decrement_saturates_at_zero() {
        let counter = GameCounter::new(1);
        counter.decrement();
        assert_eq!(counter.active(), 0);
    }

    #[test]
    fn test_is_max_accounts_for_reserved_slots() {
        let counter = GameCounter::new(2);
        assert!(!counter.is_max(0));
        assert!(!counter.is_max(1));
        assert!(counter.is_max(2));

        assert!(counter.try_increment());
        assert!(counter.is_max(1));
        assert!(!counter.is_max(0));
    }
}
