//! Reorder Buffer (§3, §4.D, Component 10).
//!
//! A 32-entry circular buffer indexed 0-31; the index itself *is* the rename
//! tag (`Qi`) carried by the register file, flags unit, and reservation
//! stations — there is no separate global tag counter, matching the
//! reference prototype's 5-bit `ROBTail_o`/`CommitROBIdx_i` wires.

use crate::tomasulo::isa::AllocType;

/// One in-flight instruction's ROB state.
#[derive(Clone, Copy, Debug, Default, serde::Serialize)]
pub struct RobEntry {
    /// Entry is allocated (occupied).
    pub busy: bool,
    /// Result (or branch outcome, or store address+data) is available.
    pub ready: bool,
    /// Resource class, used by commit to decide how to retire.
    pub alloc_type: AllocType,
    /// Architectural destination register index (4 bits; meaningless for stores/branches).
    pub dest_reg: u8,
    /// Computed result value.
    pub value: u64,
    /// 4-bit exception code; `0` means none.
    pub exception_code: u8,
    /// Program counter of the instruction.
    pub pc: u64,
    /// Raw opcode, for diagnostics and commit dispatch.
    pub opcode: u8,
    /// Id of the reservation station / buffer that owns this entry, for the
    /// commit-time `Free` signal.
    pub source_station: u8,
    /// Result flags, if this instruction produces them.
    pub flags_result: u8,
    /// Whether `flags_result` has been written.
    pub flags_valid: bool,
    /// Whether this instruction is a flags producer at all.
    pub modifies_flags: bool,
    /// Statically predicted branch direction (always not-taken in this design; §4.G).
    pub predicted_taken: bool,
    /// Whether a branch resolved as a misprediction.
    pub mispredict: bool,
    /// Resolved branch target.
    pub branch_target: u64,
    /// Store address, latched by `StoreComplete`.
    pub store_addr: u64,
    /// Store data, latched by `StoreComplete`.
    pub store_data: u64,
}

/// Reorder buffer: a fixed 32-entry circular queue.
#[derive(Clone, Debug)]
pub struct Rob {
    entries: Vec<RobEntry>,
    head: usize,
    tail: usize,
    count: usize,
}

impl Rob {
    /// Builds an empty ROB with the given capacity (default 32, §3).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![RobEntry::default(); capacity],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Resets to the empty, power-on state.
    pub fn reset(&mut self) {
        for e in &mut self.entries {
            *e = RobEntry::default();
        }
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }

    /// Capacity (number of entries).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ROB has no free slot for a new allocation.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count == self.entries.len()
    }

    /// Whether the ROB has no in-flight instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of in-flight entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// The tag that the next `allocate` call would use — exposed so issue
    /// can write it into a register's/flags' `Qi` and into a reservation
    /// station's destination tag *before* actually allocating.
    #[must_use]
    pub fn next_tag(&self) -> u8 {
        self.tail as u8
    }

    /// Allocates a fresh entry at the tail. Panics if full; callers must
    /// check `is_full` first (control unit only asserts allocate when both
    /// the target station and the ROB have room).
    pub fn allocate(&mut self, entry: RobEntry) -> u8 {
        debug_assert!(!self.is_full(), "ROB allocate with no free entry");
        let tag = self.tail as u8;
        self.entries[self.tail] = RobEntry {
            busy: true,
            ..entry
        };
        self.tail = (self.tail + 1) % self.entries.len();
        self.count += 1;
        tag
    }

    /// Read-only access to an entry by tag, for operand forwarding.
    #[must_use]
    pub fn entry(&self, tag: u8) -> &RobEntry {
        &self.entries[tag as usize]
    }

    /// Every in-flight entry, oldest (head) first, for the UI snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RobEntry> {
        (0..self.count).map(|i| self.entries[(self.head + i) % self.entries.len()]).collect()
    }

    /// Operand-forwarding query: given a tag, the value and readiness
    /// (and, separately, flags readiness/value) an RS can latch this cycle.
    #[must_use]
    pub fn forward(&self, tag: u8) -> (bool, u64) {
        let e = &self.entries[tag as usize];
        (e.ready, e.value)
    }

    /// Flags-forwarding query, mirroring [`Self::forward`].
    #[must_use]
    pub fn forward_flags(&self, tag: u8) -> (bool, u8) {
        let e = &self.entries[tag as usize];
        (e.flags_valid, e.flags_result)
    }

    /// CDB snoop: marks the entry ready and records its value and exception
    /// code. Multiple CDBs may each call this once in the same cycle for
    /// distinct tags.
    pub fn snoop_cdb(&mut self, tag: u8, value: u64, exception_code: u8) {
        let e = &mut self.entries[tag as usize];
        debug_assert!(e.busy, "CDB snoop for non-busy ROB entry {tag}");
        e.value = value;
        e.exception_code = exception_code;
        e.ready = true;
    }

    /// CDB-carried flags snoop, independent of whether the same instruction
    /// also carries a value (e.g. CMP-only writes flags but no value).
    pub fn snoop_cdb_flags(&mut self, tag: u8, flags: u8) {
        let e = &mut self.entries[tag as usize];
        e.flags_result = flags;
        e.flags_valid = true;
    }

    /// Branch-result snoop (not through the CDB; driven directly by the
    /// branch executor onto the ROB's dedicated branch-result bus).
    pub fn snoop_branch(&mut self, tag: u8, mispredict: bool, target: u64) {
        let e = &mut self.entries[tag as usize];
        e.mispredict = mispredict;
        e.branch_target = target;
        e.ready = true;
    }

    /// Marks an entry ready with an exception code and no result value, used
    /// by the AGU-segfault path for both loads and stores.
    pub fn mark_exception(&mut self, tag: u8, exception_code: u8) {
        let e = &mut self.entries[tag as usize];
        e.exception_code = exception_code;
        e.ready = true;
    }

    /// Store-complete snoop from a store buffer: the address and data become
    /// visible for the eventual commit-time architectural write.
    ///
    /// # Errors
    /// Returns `Err` (an invariant violation, §7.2) if the targeted entry is
    /// not busy.
    pub fn snoop_store_complete(
        &mut self,
        tag: u8,
        addr: u64,
        data: u64,
    ) -> Result<(), crate::error::InvariantViolation> {
        let e = &mut self.entries[tag as usize];
        if !e.busy {
            return Err(crate::error::InvariantViolation::StoreCompleteForIdleEntry { rob_tag: tag });
        }
        e.store_addr = addr;
        e.store_data = data;
        e.ready = true;
        Ok(())
    }

    /// The head entry (oldest in-flight instruction), for the commit unit.
    #[must_use]
    pub fn head(&self) -> Option<&RobEntry> {
        if self.is_empty() {
            None
        } else {
            Some(&self.entries[self.head])
        }
    }

    /// Head tag, valid even if the entry isn't ready yet.
    #[must_use]
    pub fn head_tag(&self) -> u8 {
        self.head as u8
    }

    /// Retires (frees) the head entry. Callers must have confirmed it was
    /// busy and ready.
    pub fn commit_pop(&mut self) {
        debug_assert!(!self.is_empty(), "commit_pop on empty ROB");
        self.entries[self.head] = RobEntry::default();
        self.head = (self.head + 1) % self.entries.len();
        self.count -= 1;
    }

    /// Flush: discards every in-flight entry (misprediction or exception recovery).
    pub fn flush(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_assigns_sequential_tags_and_wraps() {
        let mut rob = Rob::new(4);
        for expected in 0..4u8 {
            assert_eq!(rob.next_tag(), expected);
            let tag = rob.allocate(RobEntry::default());
            assert_eq!(tag, expected);
        }
        assert!(rob.is_full());
        rob.commit_pop();
        assert_eq!(rob.next_tag(), 0);
        let tag = rob.allocate(RobEntry::default());
        assert_eq!(tag, 0);
    }

    #[test]
    fn snoop_cdb_marks_ready_and_stores_value() {
        let mut rob = Rob::new(4);
        let tag = rob.allocate(RobEntry::default());
        assert!(!rob.head().unwrap().ready);
        rob.snoop_cdb(tag, 0x42, 0);
        assert!(rob.head().unwrap().ready);
        assert_eq!(rob.head().unwrap().value, 0x42);
    }

    #[test]
    fn store_complete_on_idle_entry_is_an_invariant_violation() {
        let mut rob = Rob::new(4);
        let result = rob.snoop_store_complete(0, 0, 0);
        assert!(result.is_err());
    }

    #[test]
    fn forward_reflects_a_broadcast_before_the_entry_commits() {
        let mut rob = Rob::new(4);
        let tag = rob.allocate(RobEntry::default());
        assert_eq!(rob.forward(tag), (false, 0));
        rob.snoop_cdb(tag, 0x99, 0);
        // Still sitting busy, uncommitted, but a consumer allocated after
        // this broadcast can still pick up the value here.
        assert_eq!(rob.forward(tag), (true, 0x99));
    }

    #[test]
    fn forward_flags_mirrors_forward() {
        let mut rob = Rob::new(4);
        let tag = rob.allocate(RobEntry::default());
        assert_eq!(rob.forward_flags(tag), (false, 0));
        rob.snoop_cdb_flags(tag, 0b0101);
        assert_eq!(rob.forward_flags(tag), (true, 0b0101));
    }

    #[test]
    fn flush_empties_the_buffer() {
        let mut rob = Rob::new(4);
        rob.allocate(RobEntry::default());
        rob.allocate(RobEntry::default());
        rob.flush();
        assert!(rob.is_empty());
        assert_eq!(rob.next_tag(), 0);
    }
}
