//! Architectural flags register with a rename tag (§4.D, the "Flags unit").
//!
//! Bit layout matches the integer ALU's flag-pack convention:
//! `flags = (N << 3) | (Z << 2) | (C << 1) | V`.

/// A 4-bit N/Z/C/V flag pack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Flags(pub u8);

impl Flags {
    /// Builds a flag pack from the individual bits.
    #[must_use]
    pub fn new(n: bool, z: bool, c: bool, v: bool) -> Self {
        Self((u8::from(n) << 3) | (u8::from(z) << 2) | (u8::from(c) << 1) | u8::from(v))
    }

    /// Negative flag.
    #[must_use]
    pub fn n(self) -> bool {
        self.0 & 0b1000 != 0
    }
    /// Zero flag.
    #[must_use]
    pub fn z(self) -> bool {
        self.0 & 0b0100 != 0
    }
    /// Carry flag.
    #[must_use]
    pub fn c(self) -> bool {
        self.0 & 0b0010 != 0
    }
    /// Overflow flag.
    #[must_use]
    pub fn v(self) -> bool {
        self.0 & 0b0001 != 0
    }
}

/// The flags register plus its rename tag.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlagsUnit {
    current: Flags,
    qi: u8,
    qi_valid: bool,
}

impl FlagsUnit {
    /// Resets to the zero flag state with no pending producer.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Architectural flags (stale if `qi_valid`).
    #[must_use]
    pub fn architectural(&self) -> Flags {
        self.current
    }

    /// Combinational read port used by consumers (ADC/SBC/conditional branches).
    #[must_use]
    pub fn read(&self) -> (Flags, u8, bool) {
        (self.current, self.qi, self.qi_valid)
    }

    /// Issue-stage tag write for a flags-modifying instruction.
    pub fn set_tag(&mut self, rob_tag: u8) {
        self.qi = rob_tag;
        self.qi_valid = true;
    }

    /// Commit-stage write, mirroring [`RegisterFile::commit_write`](super::regfile::RegisterFile::commit_write).
    pub fn commit_write(&mut self, flags: Flags, committing_rob_tag: u8) {
        self.current = flags;
        if self.qi_valid && self.qi == committing_rob_tag {
            self.qi_valid = false;
        }
    }

    /// Flush: clears the pending tag.
    pub fn flush(&mut self) {
        self.qi_valid = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_pack_matches_alu_bit_convention() {
        let f = Flags::new(true, false, true, false);
        assert_eq!(f.0, 0b1010);
        assert!(f.n());
        assert!(!f.z());
        assert!(f.c());
        assert!(!f.v());
    }
}
