//! Private L1 cache controller state machine (§4.K).

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;

use crate::mesi::bus::Bus;
use crate::mesi::counters::Counters;
use crate::mesi::types::{BusCommand, CpuRequest, MesiState, SnoopResponse, LINE_BYTES};

/// One cached line: coherence state, tag, and data.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Line {
    /// Whether this way holds a live line.
    pub valid: bool,
    /// Coherence state; meaningless if `!valid`.
    pub state: MesiState,
    /// Tag bits above the set index.
    pub tag: u64,
    /// Line contents.
    pub data: [u8; LINE_BYTES],
}

/// The controller's public-facing FSM state (§4.K).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ControllerState {
    /// Awaiting a CPU request.
    #[default]
    Idle,
    /// Combinational tag match against the selected set.
    Lookup,
    /// Driving a request command onto the bus, holding it until grant.
    ReqBus,
    /// Granted; sampling `shared_seen`/`modified_seen`.
    WaitGrant,
    /// Awaiting the one-shot data publish and `done`.
    WaitData,
    /// Writing the refilled (or upgraded) line into the cache array.
    Fill,
    /// Holding `ready` for the CPU to acknowledge.
    WaitAck,
}

/// What the controller is mid-transaction for; consulted by [`L1::snoop`]
/// instead of the line's committed state so a concurrent `BusReadExclusive`
/// observes the *intended* resulting state, not the stale one (§4.K).
#[derive(Clone, Copy, Debug)]
struct PendingFill {
    set: usize,
    way: usize,
    tag: u64,
    command: BusCommand,
    cancelled: bool,
}

struct Inner {
    lines: Vec<Vec<Line>>,
    lru: Vec<Vec<u8>>,
    state: ControllerState,
    request: Option<CpuRequest>,
    pending: Option<PendingFill>,
    writeback_pending: bool,
    result: u64,
    ready: bool,
}

/// A private, set-associative L1 cache with a MESI controller FSM.
pub struct L1 {
    sets: usize,
    ways: usize,
    program: Mutex<VecDeque<CpuRequest>>,
    inner: Mutex<Inner>,
}

impl L1 {
    /// Builds an empty L1 with `sets` sets and `ways` ways per set.
    #[must_use]
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            sets,
            ways,
            program: Mutex::new(VecDeque::new()),
            inner: Mutex::new(Inner {
                lines: vec![vec![Line::default(); ways]; sets],
                lru: vec![vec![0; ways]; sets],
                state: ControllerState::Idle,
                request: None,
                pending: None,
                writeback_pending: false,
                result: 0,
                ready: false,
            }),
        }
    }

    fn set_and_tag(&self, addr: u16) -> (usize, u64) {
        let line_bits = LINE_BYTES.trailing_zeros();
        let set_bits = self.sets.trailing_zeros();
        let set = ((addr as u32 >> line_bits) & ((1 << set_bits) - 1)) as usize;
        let tag = (addr as u32 >> (line_bits + set_bits)) as u64;
        (set, tag)
    }

    fn line_address(addr: u16) -> u16 {
        addr - (addr % LINE_BYTES as u16)
    }

    /// Queues one CPU-side request for this L1's PE driver to issue once idle.
    pub fn submit(&self, request: CpuRequest) {
        self.program.lock().expect("program lock poisoned").push_back(request);
    }

    /// Whether the PE driver's program queue and the controller are both idle.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        let inner = self.inner.lock().expect("l1 lock poisoned");
        inner.state == ControllerState::Idle && inner.request.is_none() && self.program.lock().expect("program lock poisoned").is_empty()
    }

    /// The last completed load's result, valid only the cycle `ready` is observed.
    #[must_use]
    pub fn last_result(&self) -> u64 {
        self.inner.lock().expect("l1 lock poisoned").result
    }

    /// Resets the controller, drains the program queue, and invalidates every line.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("l1 lock poisoned");
        for set in &mut inner.lines {
            for line in set.iter_mut() {
                *line = Line::default();
            }
        }
        inner.state = ControllerState::Idle;
        inner.request = None;
        inner.pending = None;
        inner.writeback_pending = false;
        inner.ready = false;
        self.program.lock().expect("program lock poisoned").clear();
    }

    /// A read-only snapshot of every line, for the UI.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Vec<Line>> {
        self.inner.lock().expect("l1 lock poisoned").lines.clone()
    }

    fn choose_victim(lines: &[Line], lru: &[u8]) -> usize {
        lines
            .iter()
            .position(|l| !l.valid)
            .unwrap_or_else(|| lru.iter().enumerate().min_by_key(|(_, &age)| age).map_or(0, |(way, _)| way))
    }

    fn touch_lru(lru: &mut [u8], way: usize, ways: usize) {
        let current = lru[way];
        for age in lru.iter_mut() {
            if *age > current {
                *age -= 1;
            }
        }
        lru[way] = (ways - 1) as u8;
    }

    /// Answers a bus snoop for `line_addr` under `command`, from this L1's
    /// point of view; updates this L1's own state as a side effect.
    #[must_use]
    pub fn snoop(&self, counters: &Counters, line_addr: u16, command: BusCommand) -> SnoopResponse {
        let mut inner = self.inner.lock().expect("l1 lock poisoned");
        let (set, tag) = self.set_and_tag(line_addr);

        if let Some(pending) = inner.pending {
            if pending.tag == tag && !pending.cancelled && command == BusCommand::BusReadExclusive {
                inner.pending = Some(PendingFill { cancelled: true, ..pending });
                return SnoopResponse {
                    invalidation_ack: true,
                    ..SnoopResponse::default()
                };
            }
        }

        let Some(way) = inner.lines[set].iter().position(|l| l.valid && l.tag == tag) else {
            return SnoopResponse::default();
        };

        let state = inner.lines[set][way].state;
        match (state, command) {
            (MesiState::Modified, BusCommand::BusRead) => {
                let data = inner.lines[set][way].data;
                inner.lines[set][way].state = MesiState::Shared;
                counters.record_transition();
                SnoopResponse {
                    modified: true,
                    data: Some(data),
                    ..SnoopResponse::default()
                }
            }
            (MesiState::Modified, BusCommand::BusReadExclusive | BusCommand::BusUpgrade) => {
                let data = inner.lines[set][way].data;
                inner.lines[set][way].state = MesiState::Invalid;
                counters.record_transition();
                counters.record_invalidation();
                SnoopResponse {
                    modified: true,
                    invalidation_ack: true,
                    data: Some(data),
                    ..SnoopResponse::default()
                }
            }
            (MesiState::Exclusive | MesiState::Shared, BusCommand::BusRead) => {
                inner.lines[set][way].state = MesiState::Shared;
                counters.record_transition();
                SnoopResponse {
                    shared: true,
                    ..SnoopResponse::default()
                }
            }
            (MesiState::Exclusive | MesiState::Shared, BusCommand::BusReadExclusive | BusCommand::BusUpgrade) => {
                inner.lines[set][way].state = MesiState::Invalid;
                counters.record_transition();
                counters.record_invalidation();
                SnoopResponse {
                    invalidation_ack: true,
                    ..SnoopResponse::default()
                }
            }
            (MesiState::Invalid, _) | (_, BusCommand::WriteBack) => SnoopResponse::default(),
        }
    }

    /// One controller-cycle tick: runs exactly one FSM transition.
    pub fn tick(&self, pe: usize, bus: &Bus, counters: &Counters) {
        let mut inner = self.inner.lock().expect("l1 lock poisoned");
        match inner.state {
            ControllerState::Idle => {
                inner.ready = false;
                if let Some(req) = self.program.lock().expect("program lock poisoned").pop_front() {
                    inner.request = Some(req);
                    inner.state = ControllerState::Lookup;
                }
            }

            ControllerState::Lookup => {
                let req = inner.request.expect("Lookup state with no latched request");
                let (set, tag) = self.set_and_tag(req.address);
                let ways = self.ways;
                match inner.lines[set].iter().position(|l| l.valid && l.tag == tag) {
                    Some(way) => {
                        let state = inner.lines[set][way].state;
                        if req.write && state == MesiState::Shared {
                            inner.pending = Some(PendingFill {
                                set,
                                way,
                                tag,
                                command: BusCommand::BusUpgrade,
                                cancelled: false,
                            });
                            inner.state = ControllerState::ReqBus;
                        } else {
                            if req.write {
                                if state == MesiState::Exclusive {
                                    counters.record_transition();
                                }
                                Self::apply_write(&mut inner.lines[set][way], &req);
                                inner.lines[set][way].state = MesiState::Modified;
                            } else {
                                inner.result = Self::read_word(&inner.lines[set][way], &req);
                            }
                            Self::touch_lru(&mut inner.lru[set], way, ways);
                            inner.ready = true;
                            inner.state = ControllerState::WaitAck;
                        }
                    }
                    None => {
                        counters.record_cache_miss();
                        let victim = Self::choose_victim(&inner.lines[set], &inner.lru[set]);
                        inner.writeback_pending = inner.lines[set][victim].valid && inner.lines[set][victim].state == MesiState::Modified;
                        let command = if req.write { BusCommand::BusReadExclusive } else { BusCommand::BusRead };
                        inner.pending = Some(PendingFill {
                            set,
                            way: victim,
                            tag,
                            command,
                            cancelled: false,
                        });
                        inner.state = ControllerState::ReqBus;
                    }
                }
            }

            ControllerState::ReqBus => {
                let pending = inner.pending.expect("ReqBus state with no pending fill");
                if inner.writeback_pending {
                    let victim_line = inner.lines[pending.set][pending.way].clone();
                    let victim_addr = self.victim_line_address(pending.set, victim_line.tag);
                    bus.request(pe, BusCommand::WriteBack, victim_addr, Some(victim_line.data));
                } else {
                    let addr = Self::line_address(inner.request.expect("ReqBus with no request").address);
                    bus.request(pe, pending.command, addr, None);
                }
                inner.state = ControllerState::WaitGrant;
            }

            ControllerState::WaitGrant => {
                if bus.port(pe).is_granted() {
                    inner.state = ControllerState::WaitData;
                }
            }

            ControllerState::WaitData => {
                if bus.port(pe).is_done() {
                    let was_writeback = inner.writeback_pending;
                    if was_writeback {
                        inner.writeback_pending = false;
                        bus.port(pe).lower_request();
                        inner.state = ControllerState::ReqBus;
                    } else {
                        let pending = inner.pending.expect("WaitData with no pending fill");
                        let (shared_seen, modified_seen) = bus.port(pe).sampled_snoop_flags();
                        if pending.command != BusCommand::BusUpgrade {
                            let data = bus.port(pe).take_read_data().unwrap_or([0u8; LINE_BYTES]);
                            inner.lines[pending.set][pending.way] = Line {
                                valid: true,
                                state: MesiState::Invalid,
                                tag: pending.tag,
                                data,
                            };
                        }
                        let resulting_state = match pending.command {
                            BusCommand::BusRead => {
                                if shared_seen || modified_seen {
                                    MesiState::Shared
                                } else {
                                    MesiState::Exclusive
                                }
                            }
                            BusCommand::BusReadExclusive | BusCommand::BusUpgrade => MesiState::Modified,
                            BusCommand::WriteBack => unreachable!("writeback handled above"),
                        };
                        inner.lines[pending.set][pending.way].state = resulting_state;
                        counters.record_transition();
                        inner.state = ControllerState::Fill;
                    }
                }
            }

            ControllerState::Fill => {
                let pending = inner.pending.expect("Fill state with no pending fill");
                let req = inner.request.expect("Fill state with no request");
                if req.write {
                    Self::apply_write(&mut inner.lines[pending.set][pending.way], &req);
                } else {
                    inner.result = Self::read_word(&inner.lines[pending.set][pending.way], &req);
                }
                let ways = self.ways;
                Self::touch_lru(&mut inner.lru[pending.set], pending.way, ways);
                bus.port(pe).lower_request();
                inner.pending = None;
                inner.ready = true;
                inner.state = ControllerState::WaitAck;
            }

            ControllerState::WaitAck => {
                inner.ready = false;
                inner.request = None;
                inner.state = ControllerState::Idle;
            }
        }
    }

    fn victim_line_address(&self, set: usize, tag: u64) -> u16 {
        let line_bits = LINE_BYTES.trailing_zeros();
        let set_bits = self.sets.trailing_zeros();
        (((tag as u32) << (line_bits + set_bits)) | ((set as u32) << line_bits)) as u16
    }

    fn apply_write(line: &mut Line, req: &CpuRequest) {
        let offset = (req.address as usize) % LINE_BYTES;
        let bytes = req.data.to_le_bytes();
        let len = req.size as usize;
        line.data[offset..offset + len].copy_from_slice(&bytes[..len]);
    }

    fn read_word(line: &Line, req: &CpuRequest) -> u64 {
        let offset = (req.address as usize) % LINE_BYTES;
        let len = req.size as usize;
        let mut bytes = [0u8; 8];
        bytes[..len].copy_from_slice(&line.data[offset..offset + len]);
        u64::from_le_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_then_idle_tick_moves_to_lookup() {
        let l1 = L1::new(8, 2);
        l1.submit(CpuRequest {
            address: 0,
            write: false,
            data: 0,
            size: 8,
        });
        let bus = Bus::new();
        let counters = Counters::new();
        l1.tick(0, &bus, &counters);
        assert_eq!(l1.inner.lock().unwrap().state, ControllerState::Lookup);
    }

    #[test]
    fn miss_issues_a_bus_read_request() {
        let l1 = L1::new(8, 2);
        l1.submit(CpuRequest {
            address: 0x40,
            write: false,
            data: 0,
            size: 8,
        });
        let bus = Bus::new();
        let counters = Counters::new();
        l1.tick(0, &bus, &counters); // Idle -> Lookup
        l1.tick(0, &bus, &counters); // Lookup -> ReqBus (miss) + issues request
        assert!(bus.port(0).has_pending_request());
    }

    #[test]
    fn snoop_on_unheld_line_is_a_no_op() {
        let l1 = L1::new(8, 2);
        let counters = Counters::new();
        let response = l1.snoop(&counters, 0x100, BusCommand::BusRead);
        assert!(!response.shared && !response.modified && !response.invalidation_ack);
    }
}
