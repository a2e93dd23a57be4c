//! Architectural register file with rename tags (§3, §4.D, Component 9).
//!
//! Sixteen 64-bit registers: `R0`-`R12`, `UPPER`, `LOWER`, `PEID`. Each has a
//! rename tag `Qi` (ROB index) plus a validity bit; while `Qi` is valid the
//! architectural value is stale and consumers must wait for (or forward
//! from) the producing ROB entry.

/// Index of the `UPPER` bound register.
pub const UPPER: usize = 13;
/// Index of the `LOWER` bound register.
pub const LOWER: usize = 14;
/// Index of the `PEID` register.
pub const PEID: usize = 15;
/// Total architectural register count.
pub const REG_COUNT: usize = 16;

/// One register's rename state: current value, and `Qi`/valid if a pending
/// in-flight instruction will produce a newer value.
#[derive(Clone, Copy, Debug, Default, serde::Serialize)]
pub struct RegSlot {
    /// Last committed architectural value.
    pub value: u64,
    /// ROB tag of the instruction that will next write this register.
    pub qi: u8,
    /// Whether `qi` is valid (a write is pending).
    pub qi_valid: bool,
}

/// The combinational read result for a single port: architectural value and
/// rename tag, exactly what a reservation station latches on allocation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadPort {
    /// Architectural value (only meaningful if `!qi_valid`).
    pub value: u64,
    /// Producing ROB tag.
    pub qi: u8,
    /// Whether a producer is still pending.
    pub qi_valid: bool,
}

/// Sixteen renamed architectural registers.
#[derive(Clone, Debug)]
pub struct RegisterFile {
    slots: [RegSlot; REG_COUNT],
}

impl Default for RegisterFile {
    fn default() -> Self {
        let mut rf = Self {
            slots: [RegSlot::default(); REG_COUNT],
        };
        rf.reset();
        rf
    }
}

impl RegisterFile {
    /// Resets to power-on state: all zero except `LOWER`, initialized to all ones
    /// (so an unconfigured bounds check rejects nothing until the program narrows it).
    pub fn reset(&mut self) {
        self.slots = [RegSlot::default(); REG_COUNT];
        self.slots[LOWER].value = u64::MAX;
    }

    /// Combinational read port.
    #[must_use]
    pub fn read(&self, index: usize) -> ReadPort {
        let s = self.slots[index];
        ReadPort {
            value: s.value,
            qi: s.qi,
            qi_valid: s.qi_valid,
        }
    }

    /// A read-only copy of every register's value and rename tag, for the UI.
    #[must_use]
    pub fn snapshot(&self) -> [RegSlot; REG_COUNT] {
        self.slots
    }

    /// Current `[UPPER, LOWER]` bounds (always read architecturally; the
    /// AGU never waits on a pending bound-register write per the original
    /// prototype, since bounds are set once at program start).
    #[must_use]
    pub fn bounds(&self) -> (u64, u64) {
        (self.slots[UPPER].value, self.slots[LOWER].value)
    }

    /// Issue-stage tag write: the destination register gets a fresh `Qi`
    /// pointing at the ROB tail, overwriting any prior tag.
    pub fn set_tag(&mut self, index: usize, rob_tag: u8) {
        self.slots[index].qi = rob_tag;
        self.slots[index].qi_valid = true;
    }

    /// Commit-stage write: updates the architectural value and clears `Qi`
    /// only if the committing ROB index still matches the stored tag
    /// (invariant 1: a later re-rename must not be clobbered).
    pub fn commit_write(&mut self, index: usize, value: u64, committing_rob_tag: u8) {
        let slot = &mut self.slots[index];
        slot.value = value;
        if slot.qi_valid && slot.qi == committing_rob_tag {
            slot.qi_valid = false;
        }
    }

    /// Flush: clears all pending rename tags (architectural values are untouched).
    pub fn flush(&mut self) {
        for s in &mut self.slots {
            s.qi_valid = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_bound_defaults_to_all_ones() {
        let rf = RegisterFile::default();
        assert_eq!(rf.bounds(), (0, u64::MAX));
    }

    #[test]
    fn commit_write_only_clears_tag_if_indices_match() {
        let mut rf = RegisterFile::default();
        rf.set_tag(1, 3);
        // A stale commit from a different (older, already-superseded) tag
        // must not clear the newer tag.
        rf.commit_write(1, 99, 7);
        assert!(rf.read(1).qi_valid);
        rf.commit_write(1, 100, 3);
        assert!(!rf.read(1).qi_valid);
        assert_eq!(rf.read(1).value, 100);
    }

    #[test]
    fn flush_clears_all_tags_but_keeps_values() {
        let mut rf = RegisterFile::default();
        rf.commit_write(2, 42, 0);
        rf.set_tag(2, 5);
        rf.flush();
        assert!(!rf.read(2).qi_valid);
        assert_eq!(rf.read(2).value, 42);
    }
}
