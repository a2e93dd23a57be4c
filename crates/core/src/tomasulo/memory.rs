//! Instruction and data caches, DRAM, and the memory arbiter (§4.H, §4.I).
//!
//! Both caches are set-associative with true LRU replacement; the data
//! cache is write-back/write-allocate, the instruction cache is read-only
//! with dedicated prefetch slots. A cache miss takes a fixed number of
//! cycles to resolve against [`Dram`], mirroring the reference prototype's
//! `D_Cache`/`I_Cache` fixed-latency fill model.

use serde::Serialize;

use crate::tomasulo::isa::op;

/// Read-only view of one cache line, for the UI snapshot boundary.
#[derive(Clone, Debug, Serialize)]
pub struct LineSnapshot {
    /// Whether this way holds a live line.
    pub valid: bool,
    /// Whether the line has been written since it was filled.
    pub dirty: bool,
    /// Tag bits above the set index.
    pub tag: u64,
    /// Line contents.
    pub data: Vec<u8>,
}

/// A single set-associative, byte-addressed line-based cache.
#[derive(Clone, Debug)]
pub struct Cache {
    sets: usize,
    ways: usize,
    line_bytes: usize,
    lines: Vec<Vec<Line>>,
    lru: Vec<Vec<u8>>,
}

#[derive(Clone, Debug, Default)]
struct Line {
    valid: bool,
    dirty: bool,
    tag: u64,
    data: Vec<u8>,
}

/// Outcome of a cache lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// Data found at `(set, way)`.
    Hit { set: usize, way: usize },
    /// Miss; `(set, victim_way, needs_writeback)`.
    Miss {
        set: usize,
        victim_way: usize,
        needs_writeback: bool,
    },
}

impl Cache {
    /// Builds an empty cache with the given geometry.
    #[must_use]
    pub fn new(sets: usize, ways: usize, line_bytes: usize) -> Self {
        Self {
            sets,
            ways,
            line_bytes,
            lines: vec![vec![Line::default(); ways]; sets],
            lru: vec![vec![0; ways]; sets],
        }
    }

    fn index_and_tag(&self, addr: u64) -> (usize, u64) {
        let line_bits = self.line_bytes.trailing_zeros();
        let set_bits = self.sets.trailing_zeros();
        let set = ((addr >> line_bits) & ((1 << set_bits) - 1)) as usize;
        let tag = addr >> (line_bits + set_bits);
        (set, tag)
    }

    /// Looks up `addr`, without mutating LRU state (pure query).
    #[must_use]
    pub fn lookup(&self, addr: u64) -> Lookup {
        let (set, tag) = self.index_and_tag(addr);
        for (way, line) in self.lines[set].iter().enumerate() {
            if line.valid && line.tag == tag {
                return Lookup::Hit { set, way };
            }
        }
        let victim_way = self.lru_victim(set);
        let needs_writeback = self.lines[set][victim_way].valid && self.lines[set][victim_way].dirty;
        Lookup::Miss {
            set,
            victim_way,
            needs_writeback,
        }
    }

    fn lru_victim(&self, set: usize) -> usize {
        for (way, line) in self.lines[set].iter().enumerate() {
            if !line.valid {
                return way;
            }
        }
        self.lru[set]
            .iter()
            .enumerate()
            .min_by_key(|(_, &age)| age)
            .map_or(0, |(way, _)| way)
    }

    fn touch_lru(&mut self, set: usize, way: usize) {
        let current = self.lru[set][way];
        for age in &mut self.lru[set] {
            if *age > current {
                *age -= 1;
            }
        }
        self.lru[set][way] = (self.ways - 1) as u8;
    }

    /// Address (line-aligned) of the victim at `(set, way)`, for a writeback.
    #[must_use]
    pub fn victim_address(&self, set: usize, way: usize) -> u64 {
        let line_bits = self.line_bytes.trailing_zeros();
        let set_bits = self.sets.trailing_zeros();
        (self.lines[set][way].tag << (line_bits + set_bits)) | ((set as u64) << line_bits)
    }

    /// Bytes held at the victim line, for a writeback to DRAM.
    #[must_use]
    pub fn victim_data(&self, set: usize, way: usize) -> Vec<u8> {
        self.lines[set][way].data.clone()
    }

    /// Fills a missed line with data fetched from DRAM, establishing LRU
    /// recency, then returns the filled `(set, way)`.
    pub fn fill(&mut self, set: usize, way: usize, addr: u64, data: Vec<u8>) {
        let (_, tag) = self.index_and_tag(addr);
        self.lines[set][way] = Line {
            valid: true,
            dirty: false,
            tag,
            data,
        };
        self.touch_lru(set, way);
    }

    /// Reads `len` bytes starting at `addr` from a hit line.
    #[must_use]
    pub fn read(&mut self, set: usize, way: usize, addr: u64, len: usize) -> u64 {
        self.touch_lru(set, way);
        let offset = (addr as usize) % self.line_bytes;
        let mut bytes = [0u8; 8];
        bytes[..len].copy_from_slice(&self.lines[set][way].data[offset..offset + len]);
        u64::from_le_bytes(bytes)
    }

    /// Writes `len` bytes of `value` into a hit line, marking it dirty.
    pub fn write(&mut self, set: usize, way: usize, addr: u64, value: u64, len: usize) {
        self.touch_lru(set, way);
        let offset = (addr as usize) % self.line_bytes;
        let bytes = value.to_le_bytes();
        self.lines[set][way].data[offset..offset + len].copy_from_slice(&bytes[..len]);
        self.lines[set][way].dirty = true;
    }

    /// A read-only copy of every line, for the UI snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Vec<LineSnapshot>> {
        self.lines
            .iter()
            .map(|set| {
                set.iter()
                    .map(|line| LineSnapshot {
                        valid: line.valid,
                        dirty: line.dirty,
                        tag: line.tag,
                        data: line.data.clone(),
                    })
                    .collect()
            })
            .collect()
    }
}

/// Flat DRAM backing store, indexed directly by byte address.
#[derive(Clone, Debug)]
pub struct Dram {
    bytes: Vec<u8>,
}

impl Dram {
    /// Builds a zero-initialized DRAM of `size` bytes.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self { bytes: vec![0; size] }
    }

    /// Reads a full cache line of `line_bytes` starting at `addr` (line-aligned).
    #[must_use]
    pub fn read_line(&self, addr: u64, line_bytes: usize) -> Vec<u8> {
        let start = addr as usize;
        self.bytes[start..start + line_bytes].to_vec()
    }

    /// Writes a full cache line back to DRAM.
    pub fn write_line(&mut self, addr: u64, data: &[u8]) {
        let start = addr as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
    }
}

/// Priority order for the data-memory arbiter: a committed store beats any
/// in-flight load, then loads are serviced in buffer order (§4.I).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemRequester {
    /// A committed store writing back to the D-cache.
    StoreCommit,
    /// Load buffer 0.
    Lb0,
    /// Load buffer 1.
    Lb1,
    /// Load buffer 2.
    Lb2,
}

impl MemRequester {
    /// Fixed priority order.
    pub const PRIORITY: [MemRequester; 4] =
        [MemRequester::StoreCommit, MemRequester::Lb0, MemRequester::Lb1, MemRequester::Lb2];
}

/// Single in-flight D-cache access arbiter: only one requester is serviced
/// at a time, in fixed priority order.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryArbiter;

impl MemoryArbiter {
    /// Picks the single winner among `pending`, in priority order.
    #[must_use]
    pub fn grant(pending: [bool; 4]) -> Option<MemRequester> {
        MemRequester::PRIORITY
            .into_iter()
            .enumerate()
            .find(|(i, _)| pending[*i])
            .map(|(_, r)| r)
    }

    /// Access width in bytes for a memory opcode: 8 for `LDR`/`STR`, 1 for
    /// `LDRB`/`STRB`.
    #[must_use]
    pub fn access_size(opcode: u8) -> usize {
        match opcode {
            op::LDR | op::STR => 8,
            op::LDRB | op::STRB => 1,
            _ => 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_fill_then_hit() {
        let mut cache = Cache::new(8, 4, 64);
        let addr = 0x1000;
        assert!(matches!(cache.lookup(addr), Lookup::Miss { .. }));
        if let Lookup::Miss { set, victim_way, .. } = cache.lookup(addr) {
            cache.fill(set, victim_way, addr, vec![0u8; 64]);
        }
        assert!(matches!(cache.lookup(addr), Lookup::Hit { .. }));
    }

    #[test]
    fn write_then_read_round_trips_within_a_line() {
        let mut cache = Cache::new(8, 4, 64);
        let addr = 0x40;
        let (set, way) = match cache.lookup(addr) {
            Lookup::Miss { set, victim_way, .. } => {
                cache.fill(set, victim_way, addr, vec![0u8; 64]);
                (set, victim_way)
            }
            Lookup::Hit { set, way } => (set, way),
        };
        cache.write(set, way, addr, 0xDEAD_BEEF, 8);
        assert_eq!(cache.read(set, way, addr, 8), 0xDEAD_BEEF);
    }

    #[test]
    fn arbiter_prefers_store_commit_over_loads() {
        let grant = MemoryArbiter::grant([true, true, true, true]);
        assert_eq!(grant, Some(MemRequester::StoreCommit));
    }

    #[test]
    fn dram_round_trips_a_full_line() {
        let mut dram = Dram::new(4096);
        dram.write_line(0x100, &[7u8; 64]);
        assert_eq!(dram.read_line(0x100, 64), vec![7u8; 64]);
    }
}
