//! Branch executor (§4.F, §4.G): resolves condition from flags, writes
//! directly onto the ROB's branch-result bus (not a CDB), and reports a
//! misprediction against the static not-taken prediction.

use crate::tomasulo::flags::Flags;
use crate::tomasulo::isa::op;

/// Evaluated branch outcome.
#[derive(Clone, Copy, Debug, Default)]
pub struct BranchResult {
    /// Whether the branch was taken.
    pub taken: bool,
    /// Resolved target PC (meaningful only if `taken`).
    pub target: u64,
    /// Whether `taken` differs from the static prediction.
    pub mispredict: bool,
}

/// Evaluates a branch's condition. `predicted_taken` is always `false` in
/// this design (§4.G: branches are statically predicted not-taken).
#[must_use]
pub fn evaluate(opcode: u8, flags: Flags, target: u64, predicted_taken: bool) -> BranchResult {
    let taken = match opcode {
        op::B => true,
        op::BEQ => flags.z(),
        op::BNE => !flags.z(),
        op::BLT => flags.n() != flags.v(),
        op::BGT => !flags.z() && flags.n() == flags.v(),
        op::BUN => flags.v(),
        op::BORD => !flags.v(),
        _ => false,
    };
    BranchResult {
        taken,
        target,
        mispredict: taken != predicted_taken,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconditional_branch_always_taken_and_mispredicts() {
        let r = evaluate(op::B, Flags::default(), 0x100, false);
        assert!(r.taken);
        assert!(r.mispredict);
    }

    #[test]
    fn beq_taken_only_when_zero_flag_set() {
        let taken = evaluate(op::BEQ, Flags::new(false, true, false, false), 0, false);
        assert!(taken.taken);
        let not_taken = evaluate(op::BEQ, Flags::new(false, false, false, false), 0, false);
        assert!(!not_taken.taken);
        assert!(!not_taken.mispredict);
    }

    #[test]
    fn blt_uses_n_xor_v() {
        let r = evaluate(op::BLT, Flags::new(true, false, false, false), 0, false);
        assert!(r.taken);
    }

    #[test]
    fn bgt_requires_not_zero_and_n_equals_v() {
        let r = evaluate(op::BGT, Flags::new(false, false, false, false), 0, false);
        assert!(r.taken);
        let zero = evaluate(op::BGT, Flags::new(false, true, false, false), 0, false);
        assert!(!zero.taken);
    }
}
