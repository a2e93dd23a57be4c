//! Floating-point ALU (§4.F): a 3-stage pipelined unit servicing FADD/FSUB,
//! sign manipulation, integer/float conversions, rounding-mode conversions,
//! and the FCMP family. Values travel as raw `f64` bit patterns on the
//! 64-bit datapath.

use crate::error::SimFault;
use crate::tomasulo::flags::Flags;
use crate::tomasulo::isa::op;

fn to_f64(bits: u64) -> f64 {
    f64::from_bits(bits)
}

fn from_f64(v: f64) -> u64 {
    v.to_bits()
}

/// N=(a<b), Z=(a==b), C=(a>=b), V=unordered (either operand NaN).
#[must_use]
pub fn compare_flags(a_bits: u64, b_bits: u64) -> Flags {
    let a = to_f64(a_bits);
    let b = to_f64(b_bits);
    let unordered = a.is_nan() || b.is_nan();
    Flags::new(!unordered && a < b, !unordered && a == b, !unordered && a >= b, unordered)
}

/// Outcome of one FP ALU evaluation.
#[derive(Clone, Copy, Debug, Default)]
pub struct FpAluResult {
    /// Result bit pattern (meaningless for CMP-family opcodes).
    pub value: u64,
    /// Flags, valid only for the CMP family.
    pub flags: Flags,
    /// Nonzero on a caught FP exception (currently none originate here; the
    /// FP ALU's operations cannot themselves divide or take a root).
    pub exception: u8,
}

/// Evaluates one (non-pipelined-timing) FP ALU operation. The 3-stage
/// latency is modeled by the functional-unit wrapper in the coordinator,
/// not by this pure function.
#[must_use]
pub fn evaluate(opcode: u8, a: u64, b: u64) -> FpAluResult {
    match opcode {
        op::FADD | op::FADDI => FpAluResult {
            value: from_f64(to_f64(a) + to_f64(b)),
            ..Default::default()
        },
        op::FSUB | op::FSUBI => FpAluResult {
            value: from_f64(to_f64(a) - to_f64(b)),
            ..Default::default()
        },
        op::FCOPYSIGN | op::FCOPYSIGNI => FpAluResult {
            value: from_f64(to_f64(a).copysign(to_f64(b))),
            ..Default::default()
        },
        op::FNEG | op::FNEGI => FpAluResult {
            value: b ^ 0x8000_0000_0000_0000,
            ..Default::default()
        },
        op::FABS | op::FABSI => FpAluResult {
            value: b & 0x7FFF_FFFF_FFFF_FFFF,
            ..Default::default()
        },
        op::CDTI | op::CDTII => FpAluResult {
            value: to_f64(b).trunc() as i64 as u64,
            ..Default::default()
        },
        op::CDTD | op::CDTDI => FpAluResult {
            value: from_f64(b as i64 as f64),
            ..Default::default()
        },
        op::FROUND_RN | op::FROUND_RNI => FpAluResult {
            value: from_f64(round_to_nearest_even(to_f64(b))),
            ..Default::default()
        },
        op::FROUND_RZ | op::FROUND_RZI => FpAluResult {
            value: from_f64(to_f64(b).trunc()),
            ..Default::default()
        },
        op::FROUND_RU | op::FROUND_RUI => FpAluResult {
            value: from_f64(to_f64(b).ceil()),
            ..Default::default()
        },
        op::FROUND_RD | op::FROUND_RDI => FpAluResult {
            value: from_f64(to_f64(b).floor()),
            ..Default::default()
        },
        op::FCMP | op::FCMPI | op::FCMN | op::FCMNI => FpAluResult {
            flags: compare_flags(a, b),
            ..Default::default()
        },
        op::FCMPS | op::FCMPSI => FpAluResult {
            flags: compare_flags(a.abs_f64_bits(), b.abs_f64_bits()),
            ..Default::default()
        },
        _ => FpAluResult::default(),
    }
}

trait AbsF64Bits {
    fn abs_f64_bits(self) -> u64;
}

impl AbsF64Bits for u64 {
    fn abs_f64_bits(self) -> u64 {
        self & 0x7FFF_FFFF_FFFF_FFFF
    }
}

fn round_to_nearest_even(v: f64) -> f64 {
    let floor = v.floor();
    let diff = v - floor;
    if diff < 0.5 {
        floor
    } else if diff > 0.5 {
        floor + 1.0
    } else if (floor as i64) % 2 == 0 {
        floor
    } else {
        floor + 1.0
    }
}

/// Whether `exception` should be reported via [`SimFault`]; the FP ALU never
/// produces one, kept only so commit can treat all execution units uniformly.
#[must_use]
pub fn fault_for(exception: u8, pc: u64) -> Option<SimFault> {
    match exception {
        5 => Some(SimFault::FpInvalid { pc }),
        _ => None,
    }
}

/// A job latched in one pipeline stage.
#[derive(Clone, Copy, Debug, Default)]
struct Stage {
    active: bool,
    opcode: u8,
    a: u64,
    b: u64,
    dest_rob: u8,
}

/// The 3-stage pipelined FP ALU functional unit: stage1 -> stage2 -> stage3
/// -> output-hold, matching the reference prototype's explicit per-stage
/// latched records.
#[derive(Clone, Copy, Debug, Default)]
pub struct FpAluUnit {
    stage1: Stage,
    stage2: Stage,
    stage3: Stage,
    output: Option<(u8, FpAluResult)>,
    last_opcode: u8,
}

impl FpAluUnit {
    /// A free (empty) pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a new job can enter stage 1 this cycle. The pipeline never
    /// stalls internally; it only backs up behind a full output-hold.
    #[must_use]
    pub fn is_free(&self) -> bool {
        !self.stage1.active
    }

    /// Accepts a new job into stage 1.
    pub fn start(&mut self, opcode: u8, a: u64, b: u64, dest_rob: u8) {
        debug_assert!(self.is_free(), "start on busy stage 1 of FpAlu pipeline");
        self.stage1 = Stage {
            active: true,
            opcode,
            a,
            b,
            dest_rob,
        };
    }

    /// Advances every stage by one cycle. Must be called once per cycle
    /// regardless of occupancy, after any `start`/CDB-accept calls.
    pub fn tick(&mut self) {
        if self.output.is_none() && self.stage3.active {
            let s = self.stage3;
            let result = evaluate(s.opcode, s.a, s.b);
            self.output = Some((s.dest_rob, result));
            self.last_opcode = s.opcode;
            self.stage3 = Stage::default();
        }
        if !self.stage3.active {
            self.stage3 = self.stage2;
            self.stage2 = Stage::default();
        }
        if !self.stage2.active {
            self.stage2 = self.stage1;
            self.stage1 = Stage::default();
        }
    }

    /// Whether a CDB request should be asserted this cycle.
    #[must_use]
    pub fn wants_cdb(&self) -> bool {
        self.output.is_some()
    }

    /// Occupancy of each of the three pipeline stages, for the UI snapshot.
    #[must_use]
    pub fn stage_activity(&self) -> [bool; 3] {
        [self.stage1.active, self.stage2.active, self.stage3.active]
    }

    /// The `(dest_rob, value, flags, flags_valid, exception)` payload for the
    /// CDB request. `flags_valid` is set for the CMP family only.
    #[must_use]
    pub fn cdb_payload(&self) -> (u8, u64, Flags, bool, u8) {
        let (tag, r) = self.output.expect("cdb_payload with no output-hold result");
        let flags_valid = crate::tomasulo::isa::decode(self.committed_opcode()).is_cmp_only;
        (tag, r.value, r.flags, flags_valid, r.exception)
    }

    fn committed_opcode(&self) -> u8 {
        // The opcode that produced the current output-hold result; stashed
        // alongside the stage data until it retires the pipeline.
        self.last_opcode
    }

    /// Called when the CDB arbiter grants this unit's request: releases the
    /// output-hold.
    pub fn on_cdb_accepted(&mut self) {
        debug_assert!(self.output.is_some());
        self.output = None;
    }

    /// Flush: drains every stage unconditionally.
    pub fn flush(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fadd_adds_as_double() {
        let a = from_f64(1.5);
        let b = from_f64(2.25);
        let r = evaluate(op::FADD, a, b);
        assert!((to_f64(r.value) - 3.75).abs() < f64::EPSILON);
    }

    #[test]
    fn fcmp_sets_unordered_on_nan() {
        let a = from_f64(f64::NAN);
        let b = from_f64(1.0);
        let r = evaluate(op::FCMP, a, b);
        assert!(r.flags.v());
        assert!(!r.flags.n());
        assert!(!r.flags.z());
    }

    #[test]
    fn fneg_flips_sign_bit_only() {
        let b = from_f64(4.0);
        let r = evaluate(op::FNEG, 0, b);
        assert!((to_f64(r.value) + 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cdtd_converts_signed_int_bits_to_double() {
        let r = evaluate(op::CDTD, 0, (-5i64) as u64);
        assert!((to_f64(r.value) + 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn pipeline_produces_output_after_three_ticks() {
        let mut unit = FpAluUnit::new();
        unit.start(op::FADD, from_f64(1.0), from_f64(2.0), 4);
        unit.tick();
        assert!(!unit.wants_cdb());
        unit.tick();
        assert!(!unit.wants_cdb());
        unit.tick();
        assert!(unit.wants_cdb());
        let (tag, value, _, flags_valid, _) = unit.cdb_payload();
        assert_eq!(tag, 4);
        assert!((to_f64(value) - 3.0).abs() < f64::EPSILON);
        assert!(!flags_valid);
    }
}
