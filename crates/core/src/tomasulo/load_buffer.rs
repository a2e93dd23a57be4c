//! Load buffers (§4.E, §4.I): three entries, each driving an address
//! through the AGU then a read through the memory arbiter before
//! requesting the CDB with the loaded value.

use crate::tomasulo::agu::AguResult;
use crate::tomasulo::regfile::ReadPort;

/// Lifecycle of a load-buffer entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize)]
pub enum LbState {
    /// Unoccupied.
    #[default]
    Idle,
    /// Allocated; waiting for the base register to resolve.
    WaitBase,
    /// Base resolved; requesting the AGU arbiter.
    RequestAgu,
    /// Address computed and in-bounds; requesting the memory arbiter.
    RequestMemory,
    /// Memory has returned a value; requesting the CDB.
    RequestCdb,
    /// AGU reported a segfault; requesting the CDB with an exception instead of a value.
    RequestCdbFault,
    /// CDB request granted; waiting for commit to free this entry.
    Done,
}

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

/// A single load-buffer entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoadBuffer {
    state: LbState,
    dest_rob: u8,
    base: Operand,
    offset: u64,
    address: u64,
    loaded_value: u64,
}

impl LoadBuffer {
    /// An idle buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LbState {
        self.state
    }

    /// Whether the entry is occupied.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state != LbState::Idle
    }

    /// Destination ROB tag.
    #[must_use]
    pub fn dest_rob(&self) -> u8 {
        self.dest_rob
    }

    /// Allocates this (idle) entry for a newly issued load.
    pub fn allocate(&mut self, dest_rob: u8, base_port: ReadPort, offset: u64) {
        debug_assert!(!self.is_busy(), "allocate on busy load buffer");
        self.dest_rob = dest_rob;
        self.base = Operand::from_read_port(base_port);
        self.offset = offset;
        self.address = 0;
        self.loaded_value = 0;
        self.state = LbState::WaitBase;
    }

    /// Snoops a CDB broadcast for the base operand.
    pub fn snoop_cdb(&mut self, tag: u8, value: u64) {
        if !self.base.valid && self.base.qi == tag {
            self.base.value = value;
            self.base.valid = true;
        }
    }

    /// Fallback tier for the base operand.
    pub fn refresh_stale_base(&mut self, architectural_value: u64) {
        if !self.base.valid {
            self.base.value = architectural_value;
            self.base.valid = true;
        }
    }

    /// The tag the base operand is still waiting on, if unresolved.
    #[must_use]
    pub fn pending_base_tag(&self) -> Option<u8> {
        (self.state == LbState::WaitBase && !self.base.valid).then_some(self.base.qi)
    }

    /// Advances `WaitBase` -> `RequestAgu` once the base resolves.
    pub fn settle(&mut self) {
        if self.state == LbState::WaitBase && self.base.valid {
            self.state = LbState::RequestAgu;
        }
    }

    /// Whether this entry should assert a request to the AGU arbiter this cycle.
    #[must_use]
    pub fn wants_agu(&self) -> bool {
        self.state == LbState::RequestAgu
    }

    /// The `(base, offset)` pair to hand the AGU once granted.
    #[must_use]
    pub fn agu_request(&self) -> (u64, u64) {
        (self.base.value, self.offset)
    }

    /// AGU result arrives: segfault routes straight to a CDB exception
    /// request, otherwise a memory read is requested next.
    pub fn agu_done(&mut self, result: AguResult) {
        debug_assert_eq!(self.state, LbState::RequestAgu, "agu_done for idle LB entry");
        self.address = result.address;
        self.state = if result.segfault {
            LbState::RequestCdbFault
        } else {
            LbState::RequestMemory
        };
    }

    /// Whether this entry should assert a request to the memory arbiter this cycle.
    #[must_use]
    pub fn wants_memory(&self) -> bool {
        self.state == LbState::RequestMemory
    }

    /// Address to read, once granted by the memory arbiter.
    #[must_use]
    pub fn memory_address(&self) -> u64 {
        self.address
    }

    /// Memory returns the loaded value.
    pub fn memory_done(&mut self, value: u64) {
        debug_assert_eq!(self.state, LbState::RequestMemory, "memory_done for idle LB entry");
        self.loaded_value = value;
        self.state = LbState::RequestCdb;
    }

    /// Whether this entry should assert a request to the CDB arbiter this cycle
    /// (either with a loaded value or with a segfault exception).
    #[must_use]
    pub fn wants_cdb(&self) -> bool {
        matches!(self.state, LbState::RequestCdb | LbState::RequestCdbFault)
    }

    /// The `(value, exception_code)` payload for the CDB request.
    #[must_use]
    pub fn cdb_payload(&self) -> (u64, u8) {
        match self.state {
            LbState::RequestCdbFault => (0, crate::error::SimFault::SEGFAULT_CODE),
            _ => (self.loaded_value, 0),
        }
    }

    /// Marks the CDB request as granted; the entry now only waits for commit
    /// to issue `Free`.
    pub fn mark_cdb_granted(&mut self) {
        debug_assert!(self.wants_cdb());
        self.state = LbState::Done;
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
    fn full_happy_path_to_cdb_request() {
        let mut lb = LoadBuffer::new();
        lb.allocate(3, pending(1), 4);
        lb.snoop_cdb(1, 0x2000);
        lb.settle();
        assert_eq!(lb.state(), LbState::RequestAgu);

        lb.agu_done(AguResult {
            address: 0x2004,
            segfault: false,
        });
        assert_eq!(lb.state(), LbState::RequestMemory);
        assert_eq!(lb.memory_address(), 0x2004);

        lb.memory_done(0xDEAD_BEEF);
        assert!(lb.wants_cdb());
        assert_eq!(lb.cdb_payload(), (0xDEAD_BEEF, 0));

        lb.mark_cdb_granted();
        assert_eq!(lb.state(), LbState::Done);
        lb.free();
        assert!(!lb.is_busy());
    }

    #[test]
    fn segfault_skips_memory_and_requests_cdb_fault() {
        let mut lb = LoadBuffer::new();
        lb.allocate(0, ready(0), 0);
        lb.settle();
        lb.agu_done(AguResult {
            address: 0xBAD,
            segfault: true,
        });
        assert_eq!(lb.state(), LbState::RequestCdbFault);
        let (value, code) = lb.cdb_payload();
        assert_eq!(value, 0);
        assert_eq!(code, crate::error::SimFault::SEGFAULT_CODE);
    }
}
