//! Instruction word layout, opcode table, and decode (§3, §4.C).
//!
//! The instruction word is 64 bits: `[63:56]` opcode, `[55:52]` Rd,
//! `[51:48]` Rn, `[47:44]` Rm, `[43:12]` a 32-bit immediate/offset, `[11:0]`
//! reserved. Opcode numbering follows the original prototype's
//! `Control_Unit::decode` table exactly so that the allocation-class,
//! flag-modifying, and flag-consuming partitions match the reference
//! behavior bit-for-bit.

/// Named opcode constants, matching the reference prototype's numbering exactly.
#[allow(missing_docs)]
pub mod op {
    pub const ADD: u8 = 0x00;
    pub const SUB: u8 = 0x01;
    pub const ADC: u8 = 0x02;
    pub const SBC: u8 = 0x03;
    pub const MUL: u8 = 0x04;
    pub const DIV: u8 = 0x05;
    pub const AND: u8 = 0x06;
    pub const ORR: u8 = 0x07;
    pub const EOR: u8 = 0x08;
    pub const BIC: u8 = 0x09;
    pub const LSL: u8 = 0x0A;
    pub const LSR: u8 = 0x0B;
    pub const ASR: u8 = 0x0C;
    pub const ROR: u8 = 0x0D;
    pub const ADDI: u8 = 0x0E;
    pub const SUBI: u8 = 0x0F;
    pub const ADCI: u8 = 0x10;
    pub const SBCI: u8 = 0x11;
    pub const MULI: u8 = 0x12;
    pub const DIVI: u8 = 0x13;
    pub const ANDI: u8 = 0x14;
    pub const ORRI: u8 = 0x15;
    pub const EORI: u8 = 0x16;
    pub const BICI: u8 = 0x17;
    pub const LSLI: u8 = 0x18;
    pub const LSRI: u8 = 0x19;
    pub const ASRI: u8 = 0x1A;
    pub const RORI: u8 = 0x1B;
    pub const INC: u8 = 0x1C;
    pub const DEC: u8 = 0x1D;
    pub const FADD: u8 = 0x1E;
    pub const FSUB: u8 = 0x1F;
    pub const FMUL: u8 = 0x20;
    pub const FDIV: u8 = 0x21;
    pub const FCOPYSIGN: u8 = 0x22;
    pub const FADDI: u8 = 0x23;
    pub const FSUBI: u8 = 0x24;
    pub const FMULI: u8 = 0x25;
    pub const FDIVI: u8 = 0x26;
    pub const FCOPYSIGNI: u8 = 0x27;
    pub const FSQRT: u8 = 0x28;
    pub const FNEG: u8 = 0x29;
    pub const FABS: u8 = 0x2A;
    pub const CDTI: u8 = 0x2B;
    pub const CDTD: u8 = 0x2C;
    pub const FROUND_RN: u8 = 0x2D;
    pub const FROUND_RZ: u8 = 0x2E;
    pub const FROUND_RU: u8 = 0x2F;
    pub const FROUND_RD: u8 = 0x30;
    pub const MOV: u8 = 0x31;
    pub const MVN: u8 = 0x32;
    pub const MOVI: u8 = 0x33;
    pub const MVNI: u8 = 0x34;
    pub const FMOVI: u8 = 0x35;
    pub const FMVNI: u8 = 0x36;
    pub const CMP: u8 = 0x37;
    pub const CMN: u8 = 0x38;
    pub const TST: u8 = 0x39;
    pub const TEQ: u8 = 0x3A;
    pub const CMPI: u8 = 0x3B;
    pub const CMNI: u8 = 0x3C;
    pub const TSTI: u8 = 0x3D;
    pub const TEQI: u8 = 0x3E;
    pub const FCMP: u8 = 0x3F;
    pub const FCMN: u8 = 0x40;
    pub const FCMPS: u8 = 0x41;
    pub const FCMPI: u8 = 0x42;
    pub const FCMNI: u8 = 0x43;
    pub const FCMPSI: u8 = 0x44;
    pub const B: u8 = 0x45;
    pub const BEQ: u8 = 0x46;
    pub const BNE: u8 = 0x47;
    pub const BLT: u8 = 0x48;
    pub const BGT: u8 = 0x49;
    pub const BUN: u8 = 0x4A;
    pub const BORD: u8 = 0x4B;
    pub const SWI: u8 = 0x4C;
    pub const NOP: u8 = 0x4D;
    pub const LDR: u8 = 0x4E;
    pub const STR: u8 = 0x4F;
    pub const LDRB: u8 = 0x50;
    pub const STRB: u8 = 0x51;
    pub const FSQRTI: u8 = 0x52;
    pub const FNEGI: u8 = 0x53;
    pub const FABSI: u8 = 0x54;
    pub const CDTII: u8 = 0x55;
    pub const CDTDI: u8 = 0x56;
    pub const FROUND_RNI: u8 = 0x57;
    pub const FROUND_RZI: u8 = 0x58;
    pub const FROUND_RUI: u8 = 0x59;
    pub const FROUND_RDI: u8 = 0x5A;
}

/// The resource class an instruction is allocated into at issue (§4.C).
///
/// The 3-bit encoding matches `Control_Unit::allocTypeFromDecode`: CMP-only
/// instructions get their own class (`0b111`) even though they execute on
/// the integer ALU, because commit treats them differently (flags-only).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize)]
pub enum AllocType {
    /// Integer ALU reservation station.
    #[default]
    IntAlu,
    /// Integer MUL/DIV reservation station.
    IntMul,
    /// FP ALU reservation station.
    FpAlu,
    /// FP MUL/DIV/SQRT reservation station.
    FpMul,
    /// Load buffer.
    Load,
    /// Store buffer.
    Store,
    /// Branch reservation station.
    Branch,
    /// Integer ALU reservation station, but commits flags only (CMP/CMN/TST/TEQ).
    CmpOnly,
}

impl AllocType {
    /// The 3-bit encoding carried in the ROB entry.
    #[must_use]
    pub fn bits(self) -> u8 {
        match self {
            Self::IntAlu => 0b000,
            Self::IntMul => 0b001,
            Self::FpAlu => 0b010,
            Self::FpMul => 0b011,
            Self::Load => 0b100,
            Self::Store => 0b101,
            Self::Branch => 0b110,
            Self::CmpOnly => 0b111,
        }
    }
}

/// Decoded control signals for one instruction, produced by [`decode`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DecodedControl {
    /// Raw 8-bit opcode.
    pub opcode: u8,
    /// Allocation class.
    pub alloc_type: AllocType,
    /// Whether the second operand is the sign/bit-extended immediate rather than Rm.
    pub use_imm: bool,
    /// Whether this instruction writes an architectural destination register.
    pub writes_rd: bool,
    /// Whether this instruction produces new N/Z/C/V flags.
    pub modifies_flags: bool,
    /// Whether this instruction consumes the current flags (ADC/SBC/conditional branch).
    pub needs_flags: bool,
    /// CMP/CMN/TST/TEQ/FCMP family: computes flags only, writes no register.
    pub is_cmp_only: bool,
    /// Unconditional branch (`B`).
    pub is_unconditional: bool,
    /// Opcode was not recognized; treated as NOP and reported as `SimFault::IllegalOpcode`.
    pub illegal: bool,
    /// `SWI`: halts the core at commit.
    pub is_swi: bool,
    /// `NOP`: no side effect at commit.
    pub is_nop: bool,
    /// Memory load (`LDR`/`LDRB`).
    pub is_load: bool,
    /// Memory store (`STR`/`STRB`).
    pub is_store: bool,
    /// Byte-sized memory access (`LDRB`/`STRB`) rather than a full 64-bit word.
    pub is_byte_access: bool,
    /// Branch instruction (conditional or unconditional).
    pub is_branch: bool,
}

/// A raw decoded instruction: opcode, register fields, and immediate, sliced
/// combinationally from the 64-bit word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawInstruction {
    /// `[63:56]`.
    pub opcode: u8,
    /// `[55:52]`.
    pub rd: u8,
    /// `[51:48]`.
    pub rn: u8,
    /// `[47:44]`.
    pub rm: u8,
    /// `[43:12]`.
    pub imm: u32,
}

impl RawInstruction {
    /// Slices a 64-bit instruction word into its fields.
    #[must_use]
    pub fn from_word(word: u64) -> Self {
        Self {
            opcode: ((word >> 56) & 0xFF) as u8,
            rd: ((word >> 52) & 0xF) as u8,
            rn: ((word >> 48) & 0xF) as u8,
            rm: ((word >> 44) & 0xF) as u8,
            imm: ((word >> 12) & 0xFFFF_FFFF) as u32,
        }
    }

    /// Re-encodes the fields into a 64-bit word (round-trip check, §8).
    #[must_use]
    pub fn to_word(self) -> u64 {
        (u64::from(self.opcode) << 56)
            | (u64::from(self.rd) << 52)
            | (u64::from(self.rn) << 48)
            | (u64::from(self.rm) << 44)
            | (u64::from(self.imm) << 12)
    }
}

/// Decodes an opcode into its control signals (§4.C), mirroring
/// `Control_Unit::decode`/`allocTypeFromDecode` from the reference prototype.
#[must_use]
pub fn decode(opcode: u8) -> DecodedControl {
    let mut d = DecodedControl {
        opcode,
        ..DecodedControl::default()
    };

    match opcode {
        // Integer ALU, 3-reg.
        0x00..=0x03 | 0x06..=0x0D => {
            d.alloc_type = AllocType::IntAlu;
            d.modifies_flags = true;
        }
        // Integer ALU, imm.
        0x0E..=0x11 | 0x14..=0x1B => {
            d.alloc_type = AllocType::IntAlu;
            d.use_imm = true;
            d.modifies_flags = true;
        }
        // INC / DEC.
        0x1C | 0x1D => {
            d.alloc_type = AllocType::IntAlu;
            d.use_imm = true;
            d.modifies_flags = true;
        }
        // Integer MUL/DIV, 3-reg.
        0x04 | 0x05 => {
            d.alloc_type = AllocType::IntMul;
            d.modifies_flags = true;
        }
        // Integer MUL/DIV, imm.
        0x12 | 0x13 => {
            d.alloc_type = AllocType::IntMul;
            d.use_imm = true;
            d.modifies_flags = true;
        }
        // FP ALU, 3-reg.
        0x1E | 0x1F | 0x22 => d.alloc_type = AllocType::FpAlu,
        // FP ALU, imm.
        0x23 | 0x24 | 0x27 => {
            d.alloc_type = AllocType::FpAlu;
            d.use_imm = true;
        }
        // FP unary (2-reg) -> FPALU.
        0x29..=0x30 => d.alloc_type = AllocType::FpAlu,
        // FP unary (imm) -> FPALU.
        0x53..=0x5A => {
            d.alloc_type = AllocType::FpAlu;
            d.use_imm = true;
        }
        // FP MUL/DIV, 3-reg.
        0x20 | 0x21 => d.alloc_type = AllocType::FpMul,
        // FP MUL/DIV, imm.
        0x25 | 0x26 => {
            d.alloc_type = AllocType::FpMul;
            d.use_imm = true;
        }
        // FSQRT, 2-reg -> FPMUL.
        0x28 => d.alloc_type = AllocType::FpMul,
        // FSQRT, imm -> FPMUL.
        0x52 => {
            d.alloc_type = AllocType::FpMul;
            d.use_imm = true;
        }
        // MOV, MVN.
        0x31 | 0x32 => d.alloc_type = AllocType::IntAlu,
        // MOVI, MVNI.
        0x33 | 0x34 => {
            d.alloc_type = AllocType::IntAlu;
            d.use_imm = true;
        }
        // FMOVI, FMVNI (bit moves on IntALU).
        0x35 | 0x36 => {
            d.alloc_type = AllocType::IntAlu;
            d.use_imm = true;
        }
        // CMP, CMN, TST, TEQ.
        0x37..=0x3A => {
            d.alloc_type = AllocType::CmpOnly;
            d.is_cmp_only = true;
            d.modifies_flags = true;
        }
        // CMPI, CMNI, TSTI, TEQI.
        0x3B..=0x3E => {
            d.alloc_type = AllocType::CmpOnly;
            d.is_cmp_only = true;
            d.use_imm = true;
            d.modifies_flags = true;
        }
        // FCMP, FCMN, FCMPS.
        0x3F..=0x41 => {
            d.alloc_type = AllocType::FpAlu;
            d.is_cmp_only = true;
            d.modifies_flags = true;
        }
        // FCMPI, FCMNI, FCMPSI.
        0x42..=0x44 => {
            d.alloc_type = AllocType::FpAlu;
            d.is_cmp_only = true;
            d.use_imm = true;
            d.modifies_flags = true;
        }
        // B.
        0x45 => {
            d.alloc_type = AllocType::Branch;
            d.is_branch = true;
            d.is_unconditional = true;
        }
        // BEQ, BNE, BLT, BGT, BUN, BORD.
        0x46..=0x4B => {
            d.alloc_type = AllocType::Branch;
            d.is_branch = true;
            d.needs_flags = true;
        }
        // SWI.
        0x4C => d.is_swi = true,
        // NOP.
        0x4D => d.is_nop = true,
        // LDR, LDRB.
        0x4E | 0x50 => {
            d.alloc_type = AllocType::Load;
            d.is_load = true;
            d.is_byte_access = opcode == 0x50;
        }
        // STR, STRB.
        0x4F | 0x51 => {
            d.alloc_type = AllocType::Store;
            d.is_store = true;
            d.is_byte_access = opcode == 0x51;
        }
        _ => {
            d.illegal = true;
            d.is_nop = true;
        }
    }

    // NeedsFlags for ADC, SBC, ADCI, SBCI.
    if matches!(opcode, 0x02 | 0x03 | 0x10 | 0x11) {
        d.needs_flags = true;
    }

    // WritesRd: everything except CMP-only, Store, Branch, NOP, SWI.
    d.writes_rd = !d.is_cmp_only && !d.is_store && !d.is_branch && !d.is_nop && !d.is_swi;

    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_round_trips_through_decode_and_encode() {
        let original = RawInstruction {
            opcode: 0x0E,
            rd: 1,
            rn: 0,
            rm: 0,
            imm: 5,
        };
        let word = original.to_word();
        let decoded = RawInstruction::from_word(word);
        assert_eq!(original, decoded);
    }

    #[test]
    fn swi_is_not_classified_as_writing_rd() {
        let d = decode(0x4C);
        assert!(d.is_swi);
        assert!(!d.writes_rd);
    }

    #[test]
    fn unknown_opcode_falls_back_to_nop_and_is_flagged_illegal() {
        let d = decode(0xFF);
        assert!(d.illegal);
        assert!(d.is_nop);
        assert!(!d.writes_rd);
    }

    #[test]
    fn adc_needs_flags_and_modifies_them() {
        let d = decode(0x02);
        assert!(d.needs_flags);
        assert!(d.modifies_flags);
        assert_eq!(d.alloc_type.bits(), AllocType::IntAlu.bits());
    }

    #[test]
    fn cmp_family_is_cmp_only_and_writes_no_register() {
        for op in [0x37u8, 0x38, 0x39, 0x3A, 0x3B, 0x3C, 0x3D, 0x3E] {
            let d = decode(op);
            assert!(d.is_cmp_only, "opcode {op:#04x}");
            assert!(!d.writes_rd, "opcode {op:#04x}");
        }
    }

    #[test]
    fn branch_opcodes_need_flags_except_unconditional() {
        let b = decode(0x45);
        assert!(b.is_unconditional);
        assert!(!b.needs_flags);
        for op in [0x46u8, 0x47, 0x48, 0x49, 0x4A, 0x4B] {
            let d = decode(op);
            assert!(d.needs_flags, "opcode {op:#04x}");
        }
    }
}
