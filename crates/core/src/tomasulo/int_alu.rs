//! Integer ALU (§4.F): single-cycle combinational, all integer ALU and
//! CMP-family opcodes, matching the reference prototype's per-opcode flag
//! formulas exactly.

use crate::tomasulo::flags::Flags;
use crate::tomasulo::isa::op;

fn rotate_right(val: u64, amount: u32) -> u64 {
    let amount = amount % 64;
    if amount == 0 {
        val
    } else {
        val.rotate_right(amount)
    }
}

/// Result of one integer ALU evaluation.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntAluResult {
    /// Result value (`0` for CMP-family opcodes, which write flags only).
    pub value: u64,
    /// N/Z/C/V, valid only if the opcode modifies flags.
    pub flags: Flags,
}

/// Evaluates one integer ALU operation.
///
/// `carry_in` is the current carry flag, consumed only by ADC/SBC/ADCI/SBCI.
#[must_use]
pub fn evaluate(opcode: u8, a: u64, b: u64, carry_in: bool) -> IntAluResult {
    let cin = u64::from(carry_in);
    let mut result = 0u64;
    let mut carry_out = false;
    let mut overflow = false;
    let mut flag_source = 0u64;
    let mut use_flag_source = false;

    match opcode {
        op::ADD | op::ADDI => {
            result = a.wrapping_add(b);
            carry_out = result < a;
            overflow = (!(a ^ b) & (a ^ result)) >> 63 != 0;
        }
        op::SUB | op::SUBI => {
            result = a.wrapping_sub(b);
            carry_out = a >= b;
            overflow = ((a ^ b) & (a ^ result)) >> 63 != 0;
        }
        op::ADC | op::ADCI => {
            let sum = a.wrapping_add(b);
            result = sum.wrapping_add(cin);
            carry_out = sum < a || result < sum;
            overflow = (!(a ^ b) & (a ^ result)) >> 63 != 0;
        }
        op::SBC | op::SBCI => {
            let sub = b.wrapping_add(u64::from(!carry_in));
            result = a.wrapping_sub(sub);
            carry_out = a >= sub;
            overflow = ((a ^ b) & (a ^ result)) >> 63 != 0;
        }
        op::INC => {
            result = a.wrapping_add(1);
            carry_out = result == 0;
            overflow = a == 0x7FFF_FFFF_FFFF_FFFF;
        }
        op::DEC => {
            result = a.wrapping_sub(1);
            carry_out = a != 0;
            overflow = a == 0x8000_0000_0000_0000;
        }
        op::AND | op::ANDI => result = a & b,
        op::ORR | op::ORRI => result = a | b,
        op::EOR | op::EORI => result = a ^ b,
        op::BIC | op::BICI => result = a & !b,
        op::LSL | op::LSLI => {
            let sh = (b % 64) as u32;
            if sh > 0 {
                carry_out = (a >> (64 - sh)) & 1 != 0;
            }
            result = a.wrapping_shl(sh);
        }
        op::LSR | op::LSRI => {
            let sh = (b % 64) as u32;
            if sh > 0 {
                carry_out = (a >> (sh - 1)) & 1 != 0;
            }
            result = a.wrapping_shr(sh);
        }
        op::ASR | op::ASRI => {
            let sh = (b % 64) as u32;
            if sh > 0 {
                carry_out = (a >> (sh - 1)) & 1 != 0;
            }
            result = ((a as i64) >> sh) as u64;
        }
        op::ROR | op::RORI => {
            let sh = (b % 64) as u32;
            if sh > 0 {
                carry_out = (a >> (sh - 1)) & 1 != 0;
            }
            result = rotate_right(a, sh);
        }
        op::MOV | op::MOVI | op::FMOVI => result = b,
        op::MVN | op::MVNI => result = !b,
        op::FMVNI => result = b ^ 0x8000_0000_0000_0000,
        op::CMP | op::CMPI => {
            flag_source = a.wrapping_sub(b);
            carry_out = a >= b;
            overflow = ((a ^ b) & (a ^ flag_source)) >> 63 != 0;
            use_flag_source = true;
        }
        op::CMN | op::CMNI => {
            flag_source = a.wrapping_add(b);
            carry_out = flag_source < a;
            overflow = (!(a ^ b) & (a ^ flag_source)) >> 63 != 0;
            use_flag_source = true;
        }
        op::TST | op::TSTI => {
            flag_source = a & b;
            use_flag_source = true;
        }
        op::TEQ | op::TEQI => {
            flag_source = a ^ b;
            use_flag_source = true;
        }
        _ => {}
    }

    let source = if use_flag_source { flag_source } else { result };
    let flags = Flags::new(source >> 63 & 1 != 0, source == 0, carry_out, overflow);

    IntAluResult { value: result, flags }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sets_carry_on_wraparound() {
        let r = evaluate(op::ADD, u64::MAX, 1, false);
        assert_eq!(r.value, 0);
        assert!(r.flags.c());
        assert!(r.flags.z());
    }

    #[test]
    fn sub_no_borrow_sets_carry() {
        let r = evaluate(op::SUB, 10, 3, false);
        assert_eq!(r.value, 7);
        assert!(r.flags.c());
        assert!(!r.flags.z());
    }

    #[test]
    fn cmp_writes_no_value_but_computes_flags() {
        let r = evaluate(op::CMP, 5, 5, false);
        assert_eq!(r.value, 0);
        assert!(r.flags.z());
    }

    #[test]
    fn adc_consumes_carry_in() {
        let r = evaluate(op::ADC, 1, 1, true);
        assert_eq!(r.value, 3);
    }

    #[test]
    fn mvn_is_bitwise_not_of_b() {
        let r = evaluate(op::MVN, 0, 0xFF, false);
        assert_eq!(r.value, !0xFFu64);
    }

    #[test]
    fn fmvni_flips_sign_bit() {
        let r = evaluate(op::FMVNI, 0, 0x4000_0000_0000_0000, false);
        assert_eq!(r.value, 0xC000_0000_0000_0000);
    }
}
