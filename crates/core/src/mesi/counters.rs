//! Analysis counters: per-PE traffic, cache misses, invalidations, and MESI
//! state transitions (§3, Core B). All monotonically increasing and
//! resettable by the UI.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Shared, thread-safe counters updated by the L1 and bus agents.
#[derive(Debug, Default)]
pub struct Counters {
    traffic: [AtomicU64; 4],
    cache_misses: AtomicU64,
    invalidations: AtomicU64,
    mesi_transitions: AtomicU64,
}

/// A point-in-time read of [`Counters`], suitable for the UI snapshot.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct CounterSnapshot {
    /// Bus transactions initiated per PE.
    pub traffic: [u64; 4],
    /// Total L1 misses across all PEs.
    pub cache_misses: u64,
    /// Total lines invalidated by a snoop.
    pub invalidations: u64,
    /// Total MESI state transitions observed.
    pub mesi_transitions: u64,
}

impl Counters {
    /// All counters start at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one bus transaction initiated by `pe`.
    pub fn record_traffic(&self, pe: usize) {
        self.traffic[pe].fetch_add(1, Ordering::Relaxed);
    }

    /// Records one L1 miss.
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one line invalidated by a snoop.
    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one MESI state transition.
    pub fn record_transition(&self) {
        self.mesi_transitions.fetch_add(1, Ordering::Relaxed);
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        for t in &self.traffic {
            t.store(0, Ordering::Relaxed);
        }
        self.cache_misses.store(0, Ordering::Relaxed);
        self.invalidations.store(0, Ordering::Relaxed);
        self.mesi_transitions.store(0, Ordering::Relaxed);
    }

    /// A consistent-enough point-in-time read for the UI (individual fields
    /// are read independently; exact cross-field atomicity is not needed for
    /// counters that only ever increase).
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        let mut traffic = [0u64; 4];
        for (slot, counter) in traffic.iter_mut().zip(&self.traffic) {
            *slot = counter.load(Ordering::Relaxed);
        }
        CounterSnapshot {
            traffic,
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            mesi_transitions: self.mesi_transitions.load(Ordering::Relaxed),
        }
    }
}
