//! Store buffers (§4.E, §4.I): two entries, RAW-hazard-free by construction
//! since a store never forwards a value, only commits one to memory.

use crate::tomasulo::agu::AguResult;
use crate::tomasulo::regfile::ReadPort;

/// Lifecycle of a store-buffer entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize)]
pub enum SbState {
    /// Unoccupied.
    #[default]
    Idle,
    /// Allocated; waiting for the base register to resolve.
    WaitBase,
    /// Base resolved; requesting the AGU arbiter.
    RequestAgu,
    /// Address computed; waiting for the data operand to resolve.
    WaitData,
    /// Address and data both ready; one-shot `StoreComplete` asserted this cycle.
    Complete,
    /// `StoreComplete` has been consumed by the ROB; waiting for commit to free this entry.
    Done,
}

/// One operand slot, identical in shape to the reservation station's.
#[derive(Clone, Copy, Debug, Default)]
struct Operand {
    value: u64,
    qi: u8,
    valid: bool,
}

impl Operand {
    fn from_read_port(p: ReadPort) -> Self {
        Self {
            value: p.value,
            qi: p.qi,
            valid: !p.qi_valid,
        }
    }
}

/// A single store buffer entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct StoreBuffer {
    state: SbState,
    dest_rob: u8,
    base: Operand,
    offset: u64,
    data: Operand,
    address: u64,
    segfault: bool,
}

impl StoreBuffer {
    /// An idle buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SbState {
        self.state
    }

    /// Whether the entry is occupied.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state != SbState::Idle
    }

    /// Destination ROB tag.
    #[must_use]
    pub fn dest_rob(&self) -> u8 {
        self.dest_rob
    }

    /// Allocates this (idle) entry for a newly issued store.
    pub fn allocate(&mut self, dest_rob: u8, base_port: ReadPort, offset: u64, data_port: ReadPort) {
        debug_assert!(!self.is_busy(), "allocate on busy store buffer");
        self.dest_rob = dest_rob;
        self.base = Operand::from_read_port(base_port);
        self.offset = offset;
        self.data = Operand::from_read_port(data_port);
        self.address = 0;
        self.segfault = false;
        self.state = SbState::WaitBase;
    }

    /// Snoops a CDB broadcast for either the base or data operand.
    pub fn snoop_cdb(&mut self, tag: u8, value: u64) {
        if !self.base.valid && self.base.qi == tag {
            self.base.value = value;
            self.base.valid = true;
        }
        if !self.data.valid && self.data.qi == tag {
            self.data.value = value;
            self.data.valid = true;
        }
    }

    /// Fallback tier for the base operand, mirroring the reservation
    /// station's stale-tag recovery.
    pub fn refresh_stale_base(&mut self, architectural_value: u64) {
        if !self.base.valid {
            self.base.value = architectural_value;
            self.base.valid = true;
        }
    }

    /// Fallback tier for the data operand.
    pub fn refresh_stale_data(&mut self, architectural_value: u64) {
        if !self.data.valid {
            self.data.value = architectural_value;
            self.data.valid = true;
        }
    }

    /// The tag the base operand is still waiting on, if unresolved.
    #[must_use]
    pub fn pending_base_tag(&self) -> Option<u8> {
        (self.state == SbState::WaitBase && !self.base.valid).then_some(self.base.qi)
    }

    /// The tag the data operand is still waiting on, if unresolved.
    #[must_use]
    pub fn pending_data_tag(&self) -> Option<u8> {
        (!self.data.valid && matches!(self.state, SbState::WaitBase | SbState::RequestAgu | SbState::WaitData))
            .then_some(self.data.qi)
    }

    /// Advances `WaitBase` -> `RequestAgu` once the base resolves. Call after snooping.
    pub fn settle(&mut self) {
        if self.state == SbState::WaitBase && self.base.valid {
            self.state = SbState::RequestAgu;
        }
    }

    /// Whether this entry should assert a request to the AGU arbiter this cycle.
    #[must_use]
    pub fn wants_agu(&self) -> bool {
        self.state == SbState::RequestAgu
    }

    /// The `(base, offset)` pair to hand the AGU once granted.
    #[must_use]
    pub fn agu_request(&self) -> (u64, u64) {
        (self.base.value, self.offset)
    }

    /// AGU result arrives: latches the address/segfault bit and advances.
    pub fn agu_done(&mut self, result: AguResult) {
        debug_assert_eq!(self.state, SbState::RequestAgu, "agu_done for idle SB entry");
        self.address = result.address;
        self.segfault = result.segfault;
        self.state = if self.segfault {
            SbState::Complete
        } else if self.data.valid {
            SbState::Complete
        } else {
            SbState::WaitData
        };
    }

    /// Whether the data operand resolving should move `WaitData` -> `Complete`.
    /// Call after snooping, each cycle.
    pub fn settle_data(&mut self) {
        if self.state == SbState::WaitData && self.data.valid {
            self.state = SbState::Complete;
        }
    }

    /// Whether a `StoreComplete` should be asserted to the ROB this cycle.
    #[must_use]
    pub fn wants_complete(&self) -> bool {
        self.state == SbState::Complete
    }

    /// The `(address, data, segfault)` triple to hand the ROB on `StoreComplete`.
    #[must_use]
    pub fn complete_payload(&self) -> (u64, u64, bool) {
        (self.address, self.data.value, self.segfault)
    }

    /// Marks the one-shot `StoreComplete` as consumed; the entry now only
    /// waits for commit to issue `Free`.
    pub fn mark_completed(&mut self) {
        debug_assert_eq!(self.state, SbState::Complete);
        self.state = SbState::Done;
    }

    /// Commit-time `Free`.
    pub fn free(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(value: u64) -> ReadPort {
        ReadPort {
            value,
            qi: 0,
            qi_valid: false,
        }
    }

    fn pending(qi: u8) -> ReadPort {
        ReadPort {
            value: 0,
            qi,
            qi_valid: true,
        }
    }

    #[test]
    fn full_happy_path_to_complete() {
        let mut sb = StoreBuffer::new();
        sb.allocate(5, pending(1), 8, pending(2));
        assert_eq!(sb.state(), SbState::WaitBase);

        sb.snoop_cdb(1, 0x1000);
        sb.settle();
        assert_eq!(sb.state(), SbState::RequestAgu);
        assert_eq!(sb.agu_request(), (0x1000, 8));

        sb.agu_done(AguResult {
            address: 0x1008,
            segfault: false,
        });
        assert_eq!(sb.state(), SbState::WaitData);

        sb.snoop_cdb(2, 0xCAFE);
        sb.settle_data();
        assert!(sb.wants_complete());
        assert_eq!(sb.complete_payload(), (0x1008, 0xCAFE, false));

        sb.mark_completed();
        assert_eq!(sb.state(), SbState::Done);
        sb.free();
        assert!(!sb.is_busy());
    }

    #[test]
    fn data_ready_before_address_skips_wait_data() {
        let mut sb = StoreBuffer::new();
        sb.allocate(0, pending(1), 0, ready(42));
        sb.snoop_cdb(1, 0x10);
        sb.settle();
        sb.agu_done(AguResult {
            address: 0x10,
            segfault: false,
        });
        assert_eq!(sb.state(), SbState::Complete);
    }

    #[test]
    fn segfault_goes_straight_to_complete() {
        let mut sb = StoreBuffer::new();
        sb.allocate(0, ready(0), 0, pending(9));
        sb.settle();
        sb.agu_done(AguResult {
            address: 0xBAD,
            segfault: true,
        });
        assert!(sb.wants_complete());
        assert!(sb.complete_payload().2);
    }
}
