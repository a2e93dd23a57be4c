//! Fetch stage (§4.B): PC register, redirect MUX, and I-cache with
//! next-line prefetch.

use crate::tomasulo::memory::{Cache, Dram, Lookup};

/// Outcome of polling the fetch stage for one cycle.
#[derive(Clone, Copy, Debug)]
pub struct FetchResult {
    /// Program counter the returned word was fetched from.
    pub pc: u64,
    /// The 64-bit instruction word, valid only if `ready`.
    pub word: u64,
    /// Whether the I-cache satisfied the request this cycle.
    pub ready: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum MissState {
    #[default]
    None,
    Counting {
        remaining: u64,
    },
}

/// PC register plus I-cache with a fixed miss latency and two
/// next-sequential-line prefetch slots.
#[derive(Clone, Debug)]
pub struct Fetch {
    pc: u64,
    icache: Cache,
    miss: MissState,
    miss_latency: u64,
    line_bytes: usize,
    prefetch_lines: [Option<u64>; 2],
}

impl Fetch {
    /// Builds a fetch stage with the given I-cache geometry and miss latency.
    #[must_use]
    pub fn new(sets: usize, ways: usize, line_bytes: usize, miss_latency: u64) -> Self {
        Self {
            pc: 0,
            icache: Cache::new(sets, ways, line_bytes),
            miss: MissState::None,
            miss_latency,
            line_bytes,
            prefetch_lines: [None, None],
        }
    }

    /// Resets the PC to zero and clears any in-flight miss.
    pub fn reset(&mut self) {
        self.pc = 0;
        self.miss = MissState::None;
        self.prefetch_lines = [None, None];
    }

    /// Current PC.
    #[must_use]
    pub fn pc(&self) -> u64 {
        self.pc
    }

    /// The instruction cache, for the UI snapshot.
    #[must_use]
    pub fn icache(&self) -> &Cache {
        &self.icache
    }

    /// Clock-edge PC update: `PC + 8` unless redirected or stalled.
    /// `flush` (branch misprediction) overrides `stall`.
    pub fn advance_pc(&mut self, stall: bool, flush: bool, redirect_target: u64) {
        if flush {
            self.pc = redirect_target;
            self.miss = MissState::None;
        } else if !stall {
            self.pc = self.pc.wrapping_add(8);
        }
    }

    /// Attempts to fetch the word at the current PC this cycle, advancing
    /// any in-flight miss countdown and issuing next-line prefetches on a
    /// demand hit.
    pub fn poll(&mut self, dram: &Dram) -> FetchResult {
        let pc = self.pc;

        if let MissState::Counting { remaining } = &mut self.miss {
            *remaining -= 1;
            if *remaining == 0 {
                self.fill_line(pc, dram);
                self.miss = MissState::None;
            } else {
                return FetchResult { pc, word: 0, ready: false };
            }
        }

        match self.icache.lookup(pc) {
            Lookup::Hit { set, way } => {
                let word = self.icache.read(set, way, pc, 8);
                self.issue_prefetches(pc, dram);
                FetchResult { pc, word, ready: true }
            }
            Lookup::Miss { .. } => {
                self.miss = MissState::Counting {
                    remaining: self.miss_latency,
                };
                FetchResult { pc, word: 0, ready: false }
            }
        }
    }

    fn fill_line(&mut self, pc: u64, dram: &Dram) {
        if let Lookup::Miss { set, victim_way, .. } = self.icache.lookup(pc) {
            let line_addr = pc - (pc % self.line_bytes as u64);
            let data = dram.read_line(line_addr, self.line_bytes);
            self.icache.fill(set, victim_way, pc, data);
        }
    }

    fn issue_prefetches(&mut self, pc: u64, dram: &Dram) {
        let line_addr = pc - (pc % self.line_bytes as u64);
        for (i, slot) in self.prefetch_lines.iter_mut().enumerate() {
            let next_line = line_addr + (i as u64 + 1) * self.line_bytes as u64;
            if *slot == Some(next_line) {
                continue;
            }
            if matches!(self.icache.lookup(next_line), Lookup::Hit { .. }) {
                continue;
            }
            if let Lookup::Miss { set, victim_way, .. } = self.icache.lookup(next_line) {
                let data = dram.read_line(next_line, self.line_bytes);
                self.icache.fill(set, victim_way, next_line, data);
                *slot = Some(next_line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_pc_adds_eight_when_not_stalled() {
        let mut f = Fetch::new(8, 4, 64, 50);
        f.advance_pc(false, false, 0);
        assert_eq!(f.pc(), 8);
    }

    #[test]
    fn flush_overrides_stall_and_redirects() {
        let mut f = Fetch::new(8, 4, 64, 50);
        f.advance_pc(true, true, 0x200);
        assert_eq!(f.pc(), 0x200);
    }

    #[test]
    fn miss_then_hit_after_latency() {
        let mut f = Fetch::new(8, 4, 64, 2);
        let dram = Dram::new(4096);
        let r1 = f.poll(&dram);
        assert!(!r1.ready);
        let r2 = f.poll(&dram);
        assert!(!r2.ready);
        let r3 = f.poll(&dram);
        assert!(r3.ready);
    }
}
