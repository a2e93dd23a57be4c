//! Instruction-word assembly and run-to-halt/quiescence drivers.

use archsim_core::mesi::l1::Line;
use archsim_core::mesi::types::{CpuRequest, LINE_BYTES};
use archsim_core::mesi::MesiSystem;
use archsim_core::tomasulo::isa::op;
use archsim_core::tomasulo::TomasuloCore;
use archsim_core::{MesiConfig, TomasuloConfig};

/// Packs one instruction's fields into the 64-bit word layout `archsim_core`
/// decodes: `[63:56]` opcode, `[55:52]` rd, `[51:48]` rn, `[47:44]` rm,
/// `[43:12]` a 32-bit immediate.
#[must_use]
pub fn word(opcode: u8, rd: u8, rn: u8, rm: u8, imm: u32) -> u64 {
    (u64::from(opcode) << 56) | (u64::from(rd) << 52) | (u64::from(rn) << 48) | (u64::from(rm) << 44) | (u64::from(imm) << 12)
}

/// `rd <- rn + rm`.
#[must_use]
pub fn add(rd: u8, rn: u8, rm: u8) -> u64 {
    word(op::ADD, rd, rn, rm, 0)
}

/// `rd <- rn - rm`.
#[must_use]
pub fn sub(rd: u8, rn: u8, rm: u8) -> u64 {
    word(op::SUB, rd, rn, rm, 0)
}

/// `rd <- rn + imm`.
#[must_use]
pub fn addi(rd: u8, rn: u8, imm: i32) -> u64 {
    word(op::ADDI, rd, rn, 0, imm as u32)
}

/// `rd <- rn - imm`.
#[must_use]
pub fn subi(rd: u8, rn: u8, imm: i32) -> u64 {
    word(op::SUBI, rd, rn, 0, imm as u32)
}

/// Flags-only compare of `rn` against `imm`.
#[must_use]
pub fn cmpi(rn: u8, imm: i32) -> u64 {
    word(op::CMPI, 0, rn, 0, imm as u32)
}

/// `rd <- imm` (via `MOVI`, ignoring `rn`/`rm`).
#[must_use]
pub fn movi(rd: u8, imm: i32) -> u64 {
    word(op::MOVI, rd, 0, 0, imm as u32)
}

/// Flags-only compare of `rn` against `rm`.
#[must_use]
pub fn cmp(rn: u8, rm: u8) -> u64 {
    word(op::CMP, 0, rn, rm, 0)
}

/// Branch-if-not-equal to `pc + offset` (offset in bytes, from the branch's own PC).
#[must_use]
pub fn bne(offset: i32) -> u64 {
    word(op::BNE, 0, 0, 0, offset as u32)
}

/// Unconditional branch to `pc + offset`.
#[must_use]
pub fn b(offset: i32) -> u64 {
    word(op::B, 0, 0, 0, offset as u32)
}

/// `rd <- mem64[rn + imm]`.
#[must_use]
pub fn ldr(rd: u8, rn: u8, imm: i32) -> u64 {
    word(op::LDR, rd, rn, 0, imm as u32)
}

/// `mem64[rn + imm] <- rd`.
#[must_use]
pub fn str_(rd: u8, rn: u8, imm: i32) -> u64 {
    word(op::STR, rd, rn, 0, imm as u32)
}

/// Halts the core at commit.
#[must_use]
pub fn swi() -> u64 {
    word(op::SWI, 0, 0, 0, 0)
}

/// Builds a core with default geometry, loads `program`, and steps it until
/// `SWI` commits or `max_cycles` elapses, panicking in the latter case (a
/// test program that never halts is a test bug, not a pass).
#[must_use]
pub fn run_to_halt(program: &[u64], max_cycles: u64) -> TomasuloCore {
    let mut core = TomasuloCore::new(TomasuloConfig::default());
    core.load_program(program);
    for _ in 0..max_cycles {
        let outcome = core.step().expect("core raised no faults in these programs");
        if outcome.halted {
            return core;
        }
    }
    panic!("program did not halt within {max_cycles} cycles");
}

/// Builds a four-PE MESI system with default geometry, submits `requests`
/// up front, and steps to quiescence, panicking if it never quiesces within
/// `max_cycles`.
#[must_use]
pub fn run_to_quiescence(requests: &[(usize, CpuRequest)], max_cycles: u64) -> MesiSystem {
    let mut system = MesiSystem::new(MesiConfig::default());
    for &(pe, request) in requests {
        system.submit(pe, request);
    }
    for _ in 0..max_cycles {
        if system.is_quiescent() {
            return system;
        }
        system.step();
    }
    panic!("system did not quiesce within {max_cycles} cycles");
}

/// Locates the line an address maps to in a `MesiConfig::default()`-shaped
/// L1 snapshot (8 sets, 2 ways), replicating `L1::set_and_tag`'s formula.
/// Panics if no valid line in that set carries the expected tag.
#[must_use]
pub fn line_for(snapshot: &[Vec<Line>], addr: u16) -> &Line {
    let line_bits = LINE_BYTES.trailing_zeros();
    let set_bits = snapshot.len().trailing_zeros();
    let set = ((addr as u32 >> line_bits) & ((1 << set_bits) - 1)) as usize;
    let tag = (addr as u32 >> (line_bits + set_bits)) as u64;
    snapshot[set]
        .iter()
        .find(|line| line.valid && line.tag == tag)
        .unwrap_or_else(|| panic!("no valid line for address {addr:#x} (set {set}, tag {tag})"))
}
