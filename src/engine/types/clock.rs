//! Thread-safe Lamport clock implementation.
//!
//! This module contains the LamportClock struct which provides thread-safe
//! generation of logical clock values for stamping locally originated
//! operations, and max-merging of clock values observed on remote operations.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// A thread-safe logical clock.
///
/// Each document replica owns one clock. Local operations are stamped with
/// `tick()`; remote operations feed their clock value back through
/// `observe()` so that later local operations are stamped after everything
/// the replica has already integrated.
pub struct LamportClock {
    counter: AtomicU64,
}

impl LamportClock {
    /// Creates a new clock starting at zero.
    pub fn new() -> Self {
        LamportClock {
            counter: AtomicU64::new(0),
        }
    }

    /// Advances the clock and returns the new value (first tick returns 1).
    pub fn tick(&self) -> u64 {
        self.counter.fetch_add(1, AtomicOrdering::SeqCst) + 1
    }

    /// Updates the clock based on a received clock value (for causal consistency).
    pub fn observe(&self, received: u64) {
        // CAS loop so the counter never goes backwards
        let mut current = self.counter.load(AtomicOrdering::SeqCst);
        while current < received {
            match self.counter.compare_exchange_weak(
                current,
                received,
                AtomicOrdering::SeqCst,
                AtomicOrdering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    /// Gets the current counter value (for debugging/testing).
    pub fn current(&self) -> u64 {
        self.counter.load(AtomicOrdering::SeqCst)
    }
}

impl Default for LamportClock {
    fn default() -> Self {
        Self::new()
    }
}
