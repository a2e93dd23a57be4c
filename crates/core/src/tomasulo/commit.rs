//! Commit unit (§4.J): exactly one retirement per cycle from the ROB head.

use crate::tomasulo::isa::AllocType;
use crate::tomasulo::rob::RobEntry;

/// What the coordinator must do this cycle as a result of committing `entry`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommitAction {
    /// Write `value` into architectural register `dest_reg`.
    pub writes_register: bool,
    /// Commit `flags_result` into the architectural flags register.
    pub writes_flags: bool,
    /// Issue a `StoreCommit` to the memory arbiter for `store_addr`/`store_data`.
    pub issues_store: bool,
    /// Flush the pipeline and redirect the PC to `branch_target`.
    pub mispredicted_branch: bool,
    /// Halt the core (`SWI`).
    pub halts: bool,
    /// Assert `Free` to `source_station` (every retirement except `SWI`).
    pub frees_station: bool,
}

/// Store-commit handshake state: the two-cycle `in-progress`/`done` sequence
/// that holds the ROB head while the architectural write reaches memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StoreCommitState {
    /// No store commit in flight.
    #[default]
    Idle,
    /// First cycle: request issued to the memory arbiter.
    InProgress,
    /// Second cycle: DRAM/cache acknowledged; safe to pop the ROB.
    Done,
}

/// Decides the commit action for the current ROB head, given its store-commit
/// handshake phase (irrelevant for non-store entries).
#[must_use]
pub fn decide(entry: &RobEntry, store_phase: StoreCommitState) -> Option<CommitAction> {
    if !entry.busy || !entry.ready {
        return None;
    }

    if entry.alloc_type == AllocType::Store && store_phase != StoreCommitState::Done {
        return None;
    }

    let mut action = CommitAction {
        frees_station: true,
        ..CommitAction::default()
    };

    match entry.alloc_type {
        AllocType::IntAlu | AllocType::IntMul | AllocType::FpAlu | AllocType::FpMul => {
            action.writes_register = true;
            action.writes_flags = entry.modifies_flags && entry.flags_valid;
        }
        AllocType::Load => action.writes_register = true,
        AllocType::Store => action.issues_store = true,
        AllocType::Branch => action.mispredicted_branch = entry.mispredict,
        AllocType::CmpOnly => action.writes_flags = entry.modifies_flags && entry.flags_valid,
    }

    if entry.opcode == crate::tomasulo::isa::op::SWI {
        action.halts = true;
        action.frees_station = false;
        action.writes_register = false;
        action.writes_flags = false;
    }
    // NOP carries no alloc_type side effect by construction (never allocated).

    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(alloc_type: AllocType) -> RobEntry {
        RobEntry {
            busy: true,
            ready: true,
            alloc_type,
            ..RobEntry::default()
        }
    }

    #[test]
    fn not_ready_entry_does_not_commit() {
        let mut e = entry(AllocType::IntAlu);
        e.ready = false;
        assert!(decide(&e, StoreCommitState::Idle).is_none());
    }

    #[test]
    fn int_alu_writes_register_and_flags_if_valid() {
        let mut e = entry(AllocType::IntAlu);
        e.modifies_flags = true;
        e.flags_valid = true;
        let action = decide(&e, StoreCommitState::Idle).unwrap();
        assert!(action.writes_register);
        assert!(action.writes_flags);
        assert!(action.frees_station);
    }

    #[test]
    fn store_waits_for_done_phase() {
        let e = entry(AllocType::Store);
        assert!(decide(&e, StoreCommitState::InProgress).is_none());
        let action = decide(&e, StoreCommitState::Done).unwrap();
        assert!(action.issues_store);
    }

    #[test]
    fn swi_halts_and_does_not_free_a_station() {
        let mut e = entry(AllocType::IntAlu);
        e.opcode = crate::tomasulo::isa::op::SWI;
        let action = decide(&e, StoreCommitState::Idle).unwrap();
        assert!(action.halts);
        assert!(!action.frees_station);
    }

    #[test]
    fn swi_performs_no_register_or_flags_write() {
        // SWI is allocated as a plain IntAlu entry (there is no dedicated
        // alloc class for it), so the IntAlu match arm above runs first and
        // sets writes_register/writes_flags; the opcode check must clear
        // both back out before returning.
        let mut e = entry(AllocType::IntAlu);
        e.opcode = crate::tomasulo::isa::op::SWI;
        e.modifies_flags = true;
        e.flags_valid = true;
        let action = decide(&e, StoreCommitState::Idle).unwrap();
        assert!(!action.writes_register);
        assert!(!action.writes_flags);
    }

    #[test]
    fn mispredicted_branch_is_reported() {
        let mut e = entry(AllocType::Branch);
        e.mispredict = true;
        let action = decide(&e, StoreCommitState::Idle).unwrap();
        assert!(action.mispredicted_branch);
    }
}
