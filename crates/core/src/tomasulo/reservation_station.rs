//! Generic reservation station (§3, §4.E).
//!
//! Five station *kinds* share one state machine; what differs between them
//! is purely behavioral (does this instruction need one operand or two, is
//! it MOV-like, does it need the flags operand) and is recorded per
//! allocation rather than baked into a type hierarchy, per the design
//! note preferring one concrete type parameterized by small flags over a
//! class hierarchy.

use crate::tomasulo::isa::AllocType;

/// Which functional-unit class a station feeds. Used only for labeling and
/// by the arbiter to route requests; the state machine itself is identical.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StationKind {
    /// Integer ALU reservation station (there are two: RS0 and RS1).
    IntAlu,
    /// FP ALU reservation station.
    FpAlu,
    /// Integer MUL/DIV reservation station.
    IntMul,
    /// FP MUL/DIV/SQRT reservation station.
    FpMul,
    /// Branch reservation station.
    Branch,
}

/// Lifecycle state of a reservation station entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize)]
pub enum RsState {
    /// Unoccupied.
    #[default]
    Idle,
    /// Allocated; waiting for `Vj`/`Vk`/flags to become valid.
    Waiting,
    /// All operands ready; requesting the functional-unit arbiter.
    Ready,
    /// Arbiter granted this station; holding the request low until `Free`.
    Dispatched,
}

/// One operand slot: value plus rename tag/validity, identical in shape to
/// [`crate::tomasulo::regfile::ReadPort`] but tracked independently because an
/// RS entry outlives the register read that populated it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Operand {
    /// Current value (meaningful only if `valid`).
    pub value: u64,
    /// Producing ROB tag, if not yet valid.
    pub qi: u8,
    /// Whether `value` has been resolved.
    pub valid: bool,
}

impl Operand {
    fn from_read_port(p: crate::tomasulo::regfile::ReadPort) -> Self {
        Self {
            value: p.value,
            qi: p.qi,
            valid: !p.qi_valid,
        }
    }
}

/// Parameters describing how a specific allocated instruction should be
/// tracked by the station — the "behavioral queries" the design note refers
/// to, captured per allocation instead of per station type.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllocShape {
    /// Second operand (`Vj`) is unused; only `Vk` (and, for immediates, the
    /// extended immediate) feeds the unit. True for MOV/MVN/unary FP ops.
    pub mov_like: bool,
    /// Second source operand is the sign/bit-extended immediate rather than Rm.
    pub use_imm: bool,
    /// Instruction modifies the flags register at commit.
    pub modifies_flags: bool,
    /// Instruction consumes the current flags as an operand (ADC/SBC/cond. branch).
    pub needs_flags: bool,
    /// CMP-only: computes flags, writes no register.
    pub is_cmp_only: bool,
}

/// One reservation-station entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct Station {
    state: RsState,
    opcode: u8,
    shape: AllocShape,
    vj: Operand,
    vk: Operand,
    flags_operand: Operand,
    dest_rob: u8,
    pc: u64,
}

impl Station {
    /// An idle station.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RsState {
        self.state
    }

    /// Whether the station is occupied (not `Idle`).
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state != RsState::Idle
    }

    /// Destination ROB tag of the instruction currently occupying this station.
    #[must_use]
    pub fn dest_rob(&self) -> u8 {
        self.dest_rob
    }

    /// Raw opcode of the occupying instruction.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Allocation shape of the occupying instruction.
    #[must_use]
    pub fn shape(&self) -> AllocShape {
        self.shape
    }

    /// Program counter of the occupying instruction (diagnostics / branch exec).
    #[must_use]
    pub fn pc(&self) -> u64 {
        self.pc
    }

    /// Allocates this (idle) station for a newly issued instruction.
    ///
    /// `rn_port`/`rm_port` are the register-file read ports for the source
    /// operands (already resolved against any in-flight producer); `imm` is
    /// the sign/bit-extended immediate, used in place of `rm_port` when
    /// `shape.use_imm` is set. `flags_port` is `None` when the instruction
    /// does not need flags.
    #[allow(clippy::too_many_arguments)]
    pub fn allocate(
        &mut self,
        opcode: u8,
        dest_rob: u8,
        pc: u64,
        shape: AllocShape,
        rn_port: crate::tomasulo::regfile::ReadPort,
        rm_port: crate::tomasulo::regfile::ReadPort,
        imm: u64,
        flags_port: Option<(crate::tomasulo::flags::Flags, u8, bool)>,
    ) {
        debug_assert!(!self.is_busy(), "allocate on busy reservation station");
        self.opcode = opcode;
        self.dest_rob = dest_rob;
        self.pc = pc;
        self.shape = shape;

        self.vj = if shape.mov_like {
            Operand {
                value: 0,
                qi: 0,
                valid: true,
            }
        } else {
            Operand::from_read_port(rn_port)
        };

        self.vk = if shape.use_imm {
            Operand {
                value: imm,
                qi: 0,
                valid: true,
            }
        } else {
            Operand::from_read_port(rm_port)
        };

        self.flags_operand = match flags_port {
            Some((flags, qi, qi_valid)) => Operand {
                value: u64::from(flags.0),
                qi,
                valid: !qi_valid,
            },
            None => Operand {
                value: 0,
                qi: 0,
                valid: true,
            },
        };

        self.state = RsState::Waiting;
    }

    /// Snoops a CDB broadcast, matching `tag` against `Qj`/`Qk`/flags tag.
    pub fn snoop_cdb(&mut self, tag: u8, value: u64) {
        if self.state != RsState::Waiting {
            return;
        }
        if !self.vj.valid && self.vj.qi == tag {
            self.vj.value = value;
            self.vj.valid = true;
        }
        if !self.vk.valid && self.vk.qi == tag {
            self.vk.value = value;
            self.vk.valid = true;
        }
    }

    /// Snoops CDB-carried flags, independent of the value snoop (flags and
    /// value may arrive from different producers on different cycles).
    pub fn snoop_cdb_flags(&mut self, tag: u8, flags: u8) {
        if self.state != RsState::Waiting {
            return;
        }
        if !self.flags_operand.valid && self.flags_operand.qi == tag {
            self.flags_operand.value = u64::from(flags);
            self.flags_operand.valid = true;
        }
    }

    /// The fallback tier (§4.E step 2): if the operand's `Qi` was cleared by
    /// commit before a CDB broadcast arrived (the producing entry already
    /// retired, e.g. the RS was allocated on the same cycle the producer
    /// committed), use the freshly-committed architectural value instead of
    /// waiting forever. Called once per cycle with the current architectural
    /// value for the same register, only if the RS's `Qi` no longer points
    /// at a live entry.
    pub fn refresh_stale_operand_j(&mut self, architectural_value: u64) {
        if self.state == RsState::Waiting && !self.vj.valid {
            self.vj.value = architectural_value;
            self.vj.valid = true;
        }
    }

    /// Fallback tier for `Vk`, mirroring [`Self::refresh_stale_operand_j`].
    pub fn refresh_stale_operand_k(&mut self, architectural_value: u64) {
        if self.state == RsState::Waiting && !self.vk.valid {
            self.vk.value = architectural_value;
            self.vk.valid = true;
        }
    }

    /// The tag `Vj` is still waiting on, if the station is `Waiting` and `Vj`
    /// hasn't resolved yet. Lets the coordinator re-poll the ROB for a tag
    /// whose CDB broadcast this station missed by not existing yet.
    #[must_use]
    pub fn pending_vj_tag(&self) -> Option<u8> {
        (self.state == RsState::Waiting && !self.vj.valid).then_some(self.vj.qi)
    }

    /// Mirrors [`Self::pending_vj_tag`] for `Vk`.
    #[must_use]
    pub fn pending_vk_tag(&self) -> Option<u8> {
        (self.state == RsState::Waiting && !self.vk.valid).then_some(self.vk.qi)
    }

    /// Whether all required operands are present and a dispatch request
    /// should be asserted to the arbiter this cycle.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == RsState::Waiting
            && self.vj.valid
            && self.vk.valid
            && (self.flags_operand.valid || !self.shape.needs_flags)
    }

    /// Advances `Waiting` -> `Ready` bookkeeping each cycle; call after
    /// snooping so `is_ready` reflects this cycle's updates.
    pub fn settle(&mut self) {
        if self.is_ready() {
            self.state = RsState::Ready;
        }
    }

    /// Operand values as seen by the functional unit: `(Vj, Vk, flags)`.
    #[must_use]
    pub fn operands(&self) -> (u64, u64, u8) {
        (self.vj.value, self.vk.value, self.flags_operand.value as u8)
    }

    /// Arbiter grant: transitions `Ready` -> `Dispatched`.
    pub fn grant(&mut self) {
        debug_assert_eq!(self.state, RsState::Ready, "grant on non-ready station");
        self.state = RsState::Dispatched;
    }

    /// Commit-time `Free`: returns the station to `Idle` regardless of its
    /// current state (a flush may free a station that never dispatched).
    pub fn free(&mut self) {
        *self = Self::default();
    }
}

/// Maps an [`AllocType`] to the reservation-station kind that services it.
/// Loads/stores/CMP-only do not use a generic [`Station`] (handled by the
/// load/store buffers and the IntALU respectively).
#[must_use]
pub fn kind_for(alloc_type: AllocType) -> Option<StationKind> {
    match alloc_type {
        AllocType::IntAlu | AllocType::CmpOnly => Some(StationKind::IntAlu),
        AllocType::FpAlu => Some(StationKind::FpAlu),
        AllocType::IntMul => Some(StationKind::IntMul),
        AllocType::FpMul => Some(StationKind::FpMul),
        AllocType::Branch => Some(StationKind::Branch),
        AllocType::Load | AllocType::Store => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tomasulo::regfile::ReadPort;

    fn ready_port(value: u64) -> ReadPort {
        ReadPort {
            value,
            qi: 0,
            qi_valid: false,
        }
    }

    fn pending_port(qi: u8) -> ReadPort {
        ReadPort {
            value: 0,
            qi,
            qi_valid: true,
        }
    }

    #[test]
    fn station_becomes_ready_once_both_operands_resolve() {
        let mut s = Station::new();
        s.allocate(
            0x00,
            1,
            0,
            AllocShape::default(),
            pending_port(3),
            ready_port(7),
            0,
            None,
        );
        assert!(!s.is_ready());
        s.snoop_cdb(3, 10);
        s.settle();
        assert!(s.is_ready());
        assert_eq!(s.operands(), (10, 7, 0));
    }

    #[test]
    fn mov_like_allocation_skips_vj() {
        let mut s = Station::new();
        let shape = AllocShape {
            mov_like: true,
            ..AllocShape::default()
        };
        s.allocate(0x31, 2, 0, shape, pending_port(1), ready_port(99), 0, None);
        s.settle();
        assert!(s.is_ready());
    }

    #[test]
    fn pending_tag_resolves_via_the_rob_forward_fallback_tier() {
        // Models a producer whose CDB broadcast already fired (so a fresh
        // snoop_cdb would never reach this station) but who hasn't
        // committed yet. The coordinator is expected to re-poll the ROB for
        // this tag every cycle via refresh_stale_operand_j/k rather than
        // relying solely on the one-shot broadcast.
        let mut s = Station::new();
        s.allocate(
            0x00,
            1,
            0,
            AllocShape::default(),
            pending_port(5),
            ready_port(7),
            0,
            None,
        );
        assert_eq!(s.pending_vj_tag(), Some(5));
        assert_eq!(s.pending_vk_tag(), None);

        s.refresh_stale_operand_j(42);
        assert_eq!(s.pending_vj_tag(), None);
        s.settle();
        assert!(s.is_ready());
        assert_eq!(s.operands(), (42, 7, 0));
    }

    #[test]
    fn grant_then_free_returns_to_idle() {
        let mut s = Station::new();
        s.allocate(
            0x00,
            0,
            0,
            AllocShape::default(),
            ready_port(1),
            ready_port(2),
            0,
            None,
        );
        s.settle();
        assert!(s.is_ready());
        s.grant();
        assert_eq!(s.state(), RsState::Dispatched);
        s.free();
        assert_eq!(s.state(), RsState::Idle);
        assert!(!s.is_busy());
    }
}
