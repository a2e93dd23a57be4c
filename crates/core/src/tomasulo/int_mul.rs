//! Integer MUL/DIV unit (§4.F): non-pipelined, MUL/MULI take 4 cycles,
//! DIV/DIVI take 16, divide-by-zero reports [`SimFault::IntDivideByZero`].

use crate::tomasulo::flags::Flags;
use crate::tomasulo::isa::op;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum State {
    #[default]
    Idle,
    Busy,
    Done,
}

/// One in-flight operation's latched inputs.
#[derive(Clone, Copy, Debug, Default)]
struct Job {
    opcode: u8,
    a: u64,
    b: u64,
    dest_rob: u8,
}

/// Outcome latched once a job completes.
#[derive(Clone, Copy, Debug, Default)]
struct Outcome {
    value: u64,
    exception: u8,
    flags: Flags,
}

/// The integer multiply/divide functional unit.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntMulUnit {
    state: State,
    job: Job,
    outcome: Outcome,
    cycles_remaining: u32,
}

impl IntMulUnit {
    /// A free unit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the unit can accept a new job this cycle.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.state == State::Idle
    }

    /// Accepts a new job; caller must have checked [`Self::is_free`].
    pub fn start(&mut self, opcode: u8, a: u64, b: u64, dest_rob: u8) {
        debug_assert!(self.is_free(), "start on busy IntMul unit");
        self.job = Job { opcode, a, b, dest_rob };
        self.cycles_remaining = if matches!(opcode, op::MUL | op::MULI) { 4 } else { 16 };
        self.state = State::Busy;
    }

    /// Advances the countdown by one cycle; call once per cycle regardless
    /// of state.
    pub fn tick(&mut self) {
        if self.state != State::Busy {
            return;
        }
        self.cycles_remaining -= 1;
        if self.cycles_remaining == 0 {
            let a = self.job.a as i64;
            let b = self.job.b as i64;
            let (value, exception) = match self.job.opcode {
                op::MUL | op::MULI => (a.wrapping_mul(b) as u64, 0),
                _ => {
                    if self.job.b == 0 {
                        (0, 3)
                    } else {
                        (a.wrapping_div(b) as u64, 0)
                    }
                }
            };
            let flags = Flags::new(value >> 63 & 1 != 0, value == 0, false, false);
            self.outcome = Outcome { value, exception, flags };
            self.state = State::Done;
        }
    }

    /// Whether a CDB request should be asserted this cycle.
    #[must_use]
    pub fn wants_cdb(&self) -> bool {
        self.state == State::Done
    }

    /// Cycles left before the in-flight job completes; meaningless if not busy.
    #[must_use]
    pub fn cycles_remaining(&self) -> u32 {
        self.cycles_remaining
    }

    /// The `(dest_rob, value, exception, flags)` payload for the CDB request.
    #[must_use]
    pub fn cdb_payload(&self) -> (u8, u64, u8, Flags) {
        (self.job.dest_rob, self.outcome.value, self.outcome.exception, self.outcome.flags)
    }

    /// Called when the CDB arbiter grants this unit's request: frees the unit.
    pub fn on_cdb_accepted(&mut self) {
        debug_assert_eq!(self.state, State::Done);
        self.state = State::Idle;
    }

    /// Flush: abandons any in-flight job unconditionally.
    pub fn flush(&mut self) {
        self.state = State::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_completes_after_four_cycles() {
        let mut u = IntMulUnit::new();
        u.start(op::MUL, 3, 4, 1);
        for _ in 0..3 {
            u.tick();
            assert!(!u.wants_cdb());
        }
        u.tick();
        assert!(u.wants_cdb());
        assert_eq!(u.cdb_payload().1, 12);
    }

    #[test]
    fn div_by_zero_reports_exception_code_three() {
        let mut u = IntMulUnit::new();
        u.start(op::DIV, 10, 0, 2);
        for _ in 0..16 {
            u.tick();
        }
        assert_eq!(u.cdb_payload().2, 3);
    }

    #[test]
    fn on_cdb_accepted_frees_the_unit() {
        let mut u = IntMulUnit::new();
        u.start(op::MUL, 1, 1, 0);
        for _ in 0..4 {
            u.tick();
        }
        u.on_cdb_accepted();
        assert!(u.is_free());
    }
}
