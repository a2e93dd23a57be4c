//! Shared bus: round-robin arbiter, snoop broadcast, and cache-to-cache
//! forwarding (§4.L).
//!
//! Each PE's link to the bus is a [`Port`]: the "master→bus" and "bus→master"
//! fields are plain atomics/mutex-guarded one-shot slots, following the
//! acquire/release discipline from §5 even though, in
//! this implementation, [`Bus::tick`] resolves a granted transaction
//! synchronously (the snoop broadcast, the DRAM fetch or cache-to-cache
//! transfer, and the data publish all happen inside one call) rather than
//! spreading across further handshake cycles of its own.

use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicU16, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::mesi::counters::Counters;
use crate::mesi::dram::Dram;
use crate::mesi::l1::L1;
use crate::mesi::types::{BusCommand, SnoopResponse, LINE_BYTES};

/// One PE's request/response link to the bus.
#[derive(Debug, Default)]
pub struct Port {
    request_valid: AtomicBool,
    command: Mutex<Option<BusCommand>>,
    address: AtomicU16,
    writeback_data: Mutex<Option<[u8; LINE_BYTES]>>,
    grant: AtomicBool,
    read_data: Mutex<Option<[u8; LINE_BYTES]>>,
    shared_seen: AtomicBool,
    modified_seen: AtomicBool,
    done: AtomicBool,
}

impl Port {
    /// Whether the bus has granted this port and published a response.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Whether the bus has granted this port (but may not yet be done).
    #[must_use]
    pub fn is_granted(&self) -> bool {
        self.grant.load(Ordering::Acquire)
    }

    /// Whether this port currently has a request line raised.
    #[must_use]
    pub fn has_pending_request(&self) -> bool {
        self.request_valid.load(Ordering::Acquire)
    }

    /// `(shared_seen, modified_seen)`, sampled once granted.
    #[must_use]
    pub fn sampled_snoop_flags(&self) -> (bool, bool) {
        (self.shared_seen.load(Ordering::Acquire), self.modified_seen.load(Ordering::Acquire))
    }

    /// Takes the one-shot read-data payload, if any.
    pub fn take_read_data(&self) -> Option<[u8; LINE_BYTES]> {
        self.read_data.lock().expect("port lock poisoned").take()
    }

    /// Drops the request line, producing a falling edge the bus waits for
    /// before re-granting this or any other port.
    pub fn lower_request(&self) {
        self.request_valid.store(false, Ordering::Release);
        self.grant.store(false, Ordering::Release);
        self.done.store(false, Ordering::Release);
    }
}

/// Round-robin bus arbiter over the four PE ports.
#[derive(Debug, Default)]
pub struct Bus {
    ports: [Port; 4],
    rr_next: AtomicUsize,
    /// Index of the port currently holding the bus, or `-1` if idle.
    owner: AtomicIsize,
}

impl Bus {
    /// A bus with no owner and all ports idle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ports: Default::default(),
            rr_next: AtomicUsize::new(0),
            owner: AtomicIsize::new(-1),
        }
    }

    /// This PE's link to the bus.
    #[must_use]
    pub fn port(&self, pe: usize) -> &Port {
        &self.ports[pe]
    }

    /// Raises `pe`'s request line for `command` against `addr` (line-aligned),
    /// carrying `writeback_data` for a `WriteBack`.
    pub fn request(&self, pe: usize, command: BusCommand, addr: u16, writeback_data: Option<[u8; LINE_BYTES]>) {
        let port = &self.ports[pe];
        *port.command.lock().expect("port lock poisoned") = Some(command);
        port.address.store(addr, Ordering::Release);
        *port.writeback_data.lock().expect("port lock poisoned") = writeback_data;
        port.request_valid.store(true, Ordering::Release);
    }

    /// One bus tick: services the owning transaction's completion, or (if
    /// idle) grants and resolves the next request in round-robin order.
    pub fn tick(&self, l1s: &[std::sync::Arc<L1>; 4], dram: &Dram, counters: &Counters) {
        let owner = self.owner.load(Ordering::Acquire);
        if owner >= 0 {
            let idx = owner as usize;
            if !self.ports[idx].request_valid.load(Ordering::Acquire) {
                self.owner.store(-1, Ordering::Release);
            }
            return;
        }

        let start = self.rr_next.load(Ordering::Relaxed);
        for offset in 0..self.ports.len() {
            let idx = (start + offset) % self.ports.len();
            if self.ports[idx].request_valid.load(Ordering::Acquire) {
                self.service(idx, l1s, dram, counters);
                self.rr_next.store((idx + 1) % self.ports.len(), Ordering::Relaxed);
                self.owner.store(idx as isize, Ordering::Release);
                return;
            }
        }
    }

    fn service(&self, idx: usize, l1s: &[std::sync::Arc<L1>; 4], dram: &Dram, counters: &Counters) {
        let port = &self.ports[idx];
        port.grant.store(true, Ordering::Release);
        counters.record_traffic(idx);

        let command = port.command.lock().expect("port lock poisoned").expect("granted port with no command");
        let addr = port.address.load(Ordering::Acquire);

        if command == BusCommand::WriteBack {
            let data = port
                .writeback_data
                .lock()
                .expect("port lock poisoned")
                .expect("WriteBack request with no carried data");
            dram.write_line(addr, &data);
            port.done.store(true, Ordering::Release);
            return;
        }

        let mut shared = false;
        let mut modified_data = None;
        for (other, l1) in l1s.iter().enumerate() {
            if other == idx {
                continue;
            }
            let response: SnoopResponse = l1.snoop(counters, addr, command);
            shared |= response.shared;
            if response.modified {
                modified_data = response.data;
            }
        }

        let line = modified_data.unwrap_or_else(|| dram.read_line(addr));

        port.shared_seen.store(shared, Ordering::Release);
        port.modified_seen.store(modified_data.is_some(), Ordering::Release);
        *port.read_data.lock().expect("port lock poisoned") = Some(line);
        port.done.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_raises_the_port_request_line() {
        let bus = Bus::new();
        bus.request(2, BusCommand::BusRead, 0x40, None);
        assert!(bus.port(2).request_valid.load(Ordering::Acquire));
        assert!(!bus.port(0).request_valid.load(Ordering::Acquire));
    }

    #[test]
    fn new_bus_starts_unowned_and_at_round_robin_slot_zero() {
        let bus = Bus::new();
        assert_eq!(bus.owner.load(Ordering::Acquire), -1);
        assert_eq!(bus.rr_next.load(Ordering::Relaxed), 0);
    }
}
