//! Shared batch counters and the consecutive-failure breaker.

use derive_getters::Getters;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Aborts a batch after too many back-to-back item failures.
///
/// An item counts once, after its own retries are exhausted. A threshold
/// of 0 disables the breaker.
///
/// # Examples
///
/// ```
/// use steadfast_batch::ConsecutiveFailureBreaker;
///
/// let breaker = ConsecutiveFailureBreaker::new(2);
/// assert!(!breaker.on_failure());
/// assert!(breaker.on_failure());
/// assert!(breaker.is_tripped());
/// ```
#[derive(Debug, Default)]
pub struct ConsecutiveFailureBreaker {
    threshold: u32,
    consecutive: AtomicU32,
    tripped: AtomicBool,
}

impl ConsecutiveFailureBreaker {
    /// Create a breaker tripping at `threshold` consecutive failures.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive: AtomicU32::new(0),
            tripped: AtomicBool::new(false),
        }
    }

    /// Failures in a row needed to trip.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Current failure streak.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive.load(Ordering::SeqCst)
    }

    /// True once the breaker has tripped. It never resets.
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Reset the streak.
    pub fn on_success(&self) {
        self.consecutive.store(0, Ordering::SeqCst);
    }

    /// Extend the streak. Returns true on the one call that trips the breaker.
    pub fn on_failure(&self) -> bool {
        let streak = self.consecutive.fetch_add(1, Ordering::SeqCst) + 1;
        if self.threshold == 0 || streak < self.threshold {
            return false;
        }
        !self.tripped.swap(true, Ordering::SeqCst)
    }
}

/// Outcome tallies shared by every worker of a batch.
#[derive(Debug, Default)]
pub struct BatchCounters {
    succeeded: AtomicU64,
    skipped: AtomicU64,
    errored: AtomicU64,
    breaker: ConsecutiveFailureBreaker,
}

impl BatchCounters {
    /// Counters whose breaker trips at `breaker_threshold`.
    pub fn new(breaker_threshold: u32) -> Self {
        Self {
            breaker: ConsecutiveFailureBreaker::new(breaker_threshold),
            ..Self::default()
        }
    }

    /// The embedded breaker.
    pub fn breaker(&self) -> &ConsecutiveFailureBreaker {
        &self.breaker
    }

    /// Count a saved result and reset the failure streak.
    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
        self.breaker.on_success();
    }

    /// Count an item that needed no work. The streak is unaffected.
    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    /// Count a failed item. Returns true if this failure tripped the breaker.
    pub fn record_error(&self) -> bool {
        self.errored.fetch_add(1, Ordering::SeqCst);
        self.breaker.on_failure()
    }

    /// Count a fatal failure. The batch stops anyway, so the breaker is not consulted.
    pub fn record_fatal(&self) {
        self.errored.fetch_add(1, Ordering::SeqCst);
    }

    /// Snapshot of the tallies.
    pub fn summary(&self, total: usize) -> BatchSummary {
        BatchSummary {
            total,
            succeeded: self.succeeded.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            errored: self.errored.load(Ordering::SeqCst),
            consecutive_failures: self.breaker.consecutive_failures(),
        }
    }
}

/// Plain snapshot of [`BatchCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Getters)]
pub struct BatchSummary {
    /// Items handed to the batch
    total: usize,
    /// Items whose result was saved
    succeeded: u64,
    /// Items that needed no work
    skipped: u64,
    /// Items that failed, including save failures
    errored: u64,
    /// Failure streak at the time of the snapshot
    consecutive_failures: u32,
}

impl BatchSummary {
    /// Items never finished, because the batch stopped or they were cancelled.
    pub fn unprocessed(&self) -> u64 {
        (self.total as u64).saturating_sub(self.succeeded + self.skipped + self.errored)
    }
}
