//! Configuration for both cores.
//!
//! Defaults reproduce the architecturally fixed geometry of each core
//! exactly; the structs exist so tests and the CLI have a single place to
//! vary them without hand-editing constants.

use serde::{Deserialize, Serialize};

/// Configuration for the Tomasulo core (§3, Core A).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomasuloConfig {
    /// Number of circular ROB entries.
    pub rob_entries: usize,
    /// I-cache sets.
    pub icache_sets: usize,
    /// I-cache ways per set.
    pub icache_ways: usize,
    /// I-cache line size in bytes.
    pub icache_line_bytes: usize,
    /// Number of I-cache prefetch slots.
    pub icache_prefetch_slots: usize,
    /// D-cache sets.
    pub dcache_sets: usize,
    /// D-cache ways per set.
    pub dcache_ways: usize,
    /// D-cache line size in bytes.
    pub dcache_line_bytes: usize,
    /// Cycles a cache miss takes to resolve against DRAM.
    pub miss_latency_cycles: u64,
}

impl Default for TomasuloConfig {
    fn default() -> Self {
        Self {
            rob_entries: 32,
            icache_sets: 8,
            icache_ways: 4,
            icache_line_bytes: 64,
            icache_prefetch_slots: 2,
            dcache_sets: 32,
            dcache_ways: 4,
            dcache_line_bytes: 64,
            miss_latency_cycles: 50,
        }
    }
}

/// Configuration for the MESI multiprocessor (§3, Core B).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MesiConfig {
    /// Number of processing elements.
    pub pe_count: usize,
    /// L1 sets per cache.
    pub l1_sets: usize,
    /// L1 ways per set.
    pub l1_ways: usize,
    /// L1 line size in bytes.
    pub l1_line_bytes: usize,
    /// DRAM size in bytes.
    pub dram_bytes: usize,
}

impl Default for MesiConfig {
    fn default() -> Self {
        Self {
            pe_count: 4,
            l1_sets: 8,
            l1_ways: 2,
            l1_line_bytes: 32,
            dram_bytes: 4096,
        }
    }
}
