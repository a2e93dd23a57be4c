//! Top-level Tomasulo core: owns every component and advances them all by
//! one clock cycle per [`TomasuloCore::step`].
//!
//! The reference prototype models a cycle as two evaluation passes over a
//! single flat signal record (§4.A). This coordinator reaches the same
//! externally-observable behavior through an equivalent ordered sequence of
//! method calls — commit before CDB arbitration before dispatch before
//! fetch — so that every consumer of a given cycle's broadcast sees state
//! latched at the *start* of that cycle, matching a synchronous design
//! without needing a literal two-pass record.

use std::collections::VecDeque;

use crate::config::TomasuloConfig;
use crate::error::SimError;
use crate::tomasulo::agu::{self, Agu, AguArbiter, AguRequest};
use crate::tomasulo::branch;
use crate::tomasulo::cdb::{CdbArbiter, CdbRequest, CdbSource};
use crate::tomasulo::commit::{self, StoreCommitState};
use crate::tomasulo::fetch::Fetch;
use crate::tomasulo::flags::FlagsUnit;
use crate::tomasulo::fp_alu::FpAluUnit;
use crate::tomasulo::fp_mul::FpMulUnit;
use crate::tomasulo::int_alu;
use crate::tomasulo::int_mul::IntMulUnit;
use crate::tomasulo::isa::{self, op, AllocType, DecodedControl, RawInstruction};
use crate::tomasulo::load_buffer::LoadBuffer;
use crate::tomasulo::memory::{Cache, Dram, Lookup, MemRequester, MemoryArbiter};
use crate::tomasulo::regfile::RegisterFile;
use crate::tomasulo::reservation_station::{kind_for, AllocShape, Station, StationKind};
use crate::tomasulo::rob::{Rob, RobEntry};
use crate::tomasulo::store_buffer::StoreBuffer;

/// How many of the most recently retired instructions the UI snapshot keeps.
const RETIREMENT_HISTORY: usize = 16;

/// Everything the CLI/snapshot layer needs to know happened this cycle.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepOutcome {
    /// Whether the core halted this cycle (`SWI` committed).
    pub halted: bool,
    /// Program counter committed, if any instruction retired this cycle.
    pub committed_pc: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default)]
struct IntAluHold {
    busy: bool,
    dest_rob: u8,
    value: u64,
    flags: crate::tomasulo::flags::Flags,
    flags_valid: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum DcacheAccessState {
    #[default]
    Idle,
    Missed {
        remaining: u64,
    },
}

/// The cycle-accurate out-of-order core (§3-§4, Core A).
pub struct TomasuloCore {
    config: TomasuloConfig,
    cycle: u64,
    halted: bool,

    fetch: Fetch,
    dram: Dram,
    dcache: Cache,
    dcache_access: DcacheAccessState,

    regfile: RegisterFile,
    flags: FlagsUnit,
    rob: Rob,

    rs_int_alu: [Station; 2],
    rs_fp_alu: Station,
    rs_int_mul: Station,
    rs_fp_mul: Station,
    rs_branch: Station,

    sb: [StoreBuffer; 2],
    lb: [LoadBuffer; 3],

    int_alu_hold: IntAluHold,
    fp_alu_unit: FpAluUnit,
    int_mul_unit: IntMulUnit,
    fp_mul_unit: FpMulUnit,

    store_commit_phase: StoreCommitState,
    retirements: VecDeque<crate::snapshot::RetiredInstruction>,
}

impl TomasuloCore {
    /// Builds a freshly reset core.
    #[must_use]
    pub fn new(config: TomasuloConfig) -> Self {
        let mut core = Self {
            fetch: Fetch::new(
                config.icache_sets,
                config.icache_ways,
                config.icache_line_bytes,
                config.miss_latency_cycles,
            ),
            dram: Dram::new(1 << 20),
            dcache: Cache::new(config.dcache_sets, config.dcache_ways, config.dcache_line_bytes),
            dcache_access: DcacheAccessState::Idle,
            regfile: RegisterFile::default(),
            flags: FlagsUnit::default(),
            rob: Rob::new(config.rob_entries),
            rs_int_alu: [Station::new(), Station::new()],
            rs_fp_alu: Station::new(),
            rs_int_mul: Station::new(),
            rs_fp_mul: Station::new(),
            rs_branch: Station::new(),
            sb: [StoreBuffer::new(), StoreBuffer::new()],
            lb: [LoadBuffer::new(), LoadBuffer::new(), LoadBuffer::new()],
            int_alu_hold: IntAluHold::default(),
            fp_alu_unit: FpAluUnit::new(),
            int_mul_unit: IntMulUnit::new(),
            fp_mul_unit: FpMulUnit::new(),
            store_commit_phase: StoreCommitState::Idle,
            retirements: VecDeque::with_capacity(RETIREMENT_HISTORY),
            config,
            cycle: 0,
            halted: false,
        };
        core.reset();
        core
    }

    /// Loads a program image (instruction words) starting at DRAM address 0.
    pub fn load_program(&mut self, words: &[u64]) {
        for (i, word) in words.iter().enumerate() {
            self.dram.write_line((i as u64) * 8, &word.to_le_bytes());
        }
    }

    /// Resets every component to its power-on state.
    pub fn reset(&mut self) {
        self.fetch.reset();
        self.regfile.reset();
        self.flags.reset();
        self.rob.reset();
        for rs in &mut self.rs_int_alu {
            rs.free();
        }
        self.rs_fp_alu.free();
        self.rs_int_mul.free();
        self.rs_fp_mul.free();
        self.rs_branch.free();
        for sb in &mut self.sb {
            sb.free();
        }
        for lb in &mut self.lb {
            lb.free();
        }
        self.int_alu_hold = IntAluHold::default();
        self.fp_alu_unit.flush();
        self.int_mul_unit.flush();
        self.fp_mul_unit.flush();
        self.store_commit_phase = StoreCommitState::Idle;
        self.retirements.clear();
        self.halted = false;
        self.cycle = 0;
    }

    /// Current cycle count.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Whether the core has halted (`SWI` retired).
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// A read-only snapshot of every UI-observable piece of state (§6).
    #[must_use]
    pub fn snapshot(&self) -> crate::snapshot::TomasuloSnapshot {
        use crate::snapshot::{
            FunctionalUnitSnapshots, ReservationStationSnapshots, StationSnapshot, TomasuloSnapshot,
        };

        let station_snapshot = |s: &Station| StationSnapshot {
            busy: s.is_busy(),
            state: s.state(),
            dest_rob: s.dest_rob(),
            opcode: s.opcode(),
            pc: s.pc(),
        };

        TomasuloSnapshot {
            cycle: self.cycle,
            pc: self.fetch.pc(),
            halted: self.halted,
            registers: self.regfile.snapshot().to_vec(),
            flags: self.flags.architectural(),
            rob: self.rob.snapshot(),
            reservation_stations: ReservationStationSnapshots {
                int_alu: self.rs_int_alu.iter().map(station_snapshot).collect(),
                fp_alu: station_snapshot(&self.rs_fp_alu),
                int_mul: station_snapshot(&self.rs_int_mul),
                fp_mul: station_snapshot(&self.rs_fp_mul),
                branch: station_snapshot(&self.rs_branch),
            },
            store_buffers: self
                .sb
                .iter()
                .map(|s| crate::snapshot::StoreBufferSnapshot {
                    busy: s.is_busy(),
                    state: s.state(),
                    dest_rob: s.dest_rob(),
                })
                .collect(),
            load_buffers: self
                .lb
                .iter()
                .map(|l| crate::snapshot::LoadBufferSnapshot {
                    busy: l.is_busy(),
                    state: l.state(),
                    dest_rob: l.dest_rob(),
                })
                .collect(),
            functional_units: FunctionalUnitSnapshots {
                int_alu_busy: self.int_alu_hold.busy,
                fp_alu_stages: self.fp_alu_unit.stage_activity(),
                int_mul_busy: !self.int_mul_unit.is_free(),
                int_mul_cycles_remaining: self.int_mul_unit.cycles_remaining(),
                fp_mul_busy: !self.fp_mul_unit.is_free(),
                fp_mul_cycles_remaining: self.fp_mul_unit.cycles_remaining(),
            },
            icache: self.fetch.icache().snapshot(),
            dcache: self.dcache.snapshot(),
            recent_retirements: self.retirements.iter().copied().collect(),
        }
    }

    /// Advances the core by one clock cycle.
    ///
    /// # Errors
    /// Returns `Err` if a simulator invariant is violated.
    pub fn step(&mut self) -> Result<StepOutcome, SimError> {
        if self.halted {
            return Ok(StepOutcome {
                halted: true,
                committed_pc: None,
            });
        }

        self.cycle += 1;
        let mut outcome = StepOutcome::default();
        let mut flush = false;
        let mut redirect_target = 0;

        // --- Commit ---
        if let Some(tag) = self.try_commit()? {
            outcome.committed_pc = Some(self.rob.entry(tag).pc);
            if self.halted {
                outcome.halted = true;
                return Ok(outcome);
            }
        }

        // --- CDB arbitration & broadcast ---
        let grants = self.arbitrate_cdb();
        if let Some(req) = grants.bus_a {
            self.broadcast(req);
        }
        if let Some(req) = grants.bus_b {
            self.broadcast(req);
        }

        // --- Functional unit ticks (advance multi-cycle pipelines) ---
        self.fp_alu_unit.tick();
        self.int_mul_unit.tick();
        self.fp_mul_unit.tick();

        // --- Settle reservation stations / buffers against this cycle's forwards ---
        self.settle_stations();

        // --- Dispatch ready stations onto free functional units ---
        self.dispatch();

        // --- AGU arbitration for store/load buffers ---
        self.run_agu();

        // --- Memory arbitration (committed store / loads) ---
        self.run_memory();

        // --- Branch resolution (combinational, writes directly to ROB) ---
        self.run_branch(&mut flush, &mut redirect_target);

        // --- Issue a new instruction if resources allow ---
        let issued = self.try_issue();

        // --- Fetch ---
        // StallIF: hold the PC whenever this cycle's fetched word wasn't
        // actually consumed, whether because the I-cache miss hasn't
        // resolved yet or because the ROB/target station had no room.
        let stall = !issued;
        self.fetch.advance_pc(stall, flush, redirect_target);

        Ok(outcome)
    }

    fn try_commit(&mut self) -> Result<Option<u8>, SimError> {
        let Some(head) = self.rob.head().copied() else {
            return Ok(None);
        };
        let Some(action) = commit::decide(&head, self.store_commit_phase) else {
            if head.alloc_type == AllocType::Store && head.ready {
                self.advance_store_commit(&head);
            }
            return Ok(None);
        };

        let tag = self.rob.head_tag();

        if action.writes_register {
            self.regfile.commit_write(head.dest_reg as usize, head.value, tag);
        }
        if action.writes_flags {
            self.flags.commit_write(crate::tomasulo::flags::Flags(head.flags_result), tag);
        }
        if action.issues_store {
            self.commit_store_to_dcache(head.store_addr, head.store_data, head.opcode);
            self.store_commit_phase = StoreCommitState::Idle;
        }
        if action.frees_station {
            self.free_station(head.source_station, head.alloc_type);
        }
        if action.mispredicted_branch {
            self.flush_pipeline();
        }
        if action.halts {
            self.halted = true;
        }

        self.rob.commit_pop();
        if self.retirements.len() == RETIREMENT_HISTORY {
            self.retirements.pop_front();
        }
        self.retirements.push_back(crate::snapshot::RetiredInstruction {
            cycle: self.cycle,
            pc: head.pc,
            opcode: head.opcode,
        });
        Ok(Some(tag))
    }

    fn advance_store_commit(&mut self, head: &RobEntry) {
        self.store_commit_phase = match self.store_commit_phase {
            StoreCommitState::Idle => StoreCommitState::InProgress,
            StoreCommitState::InProgress => {
                self.commit_store_to_dcache(head.store_addr, head.store_data, head.opcode);
                StoreCommitState::Done
            }
            StoreCommitState::Done => StoreCommitState::Done,
        };
    }

    fn commit_store_to_dcache(&mut self, addr: u64, data: u64, opcode: u8) {
        let size = MemoryArbiter::access_size(opcode);
        match self.dcache.lookup(addr) {
            Lookup::Hit { set, way } => self.dcache.write(set, way, addr, data, size),
            Lookup::Miss { set, victim_way, needs_writeback } => {
                if needs_writeback {
                    let vaddr = self.dcache.victim_address(set, victim_way);
                    let vdata = self.dcache.victim_data(set, victim_way);
                    self.dram.write_line(vaddr, &vdata);
                }
                let line_bytes = self.config.dcache_line_bytes as u64;
                let line_addr = addr - (addr % line_bytes);
                let filled = self.dram.read_line(line_addr, line_bytes as usize);
                self.dcache.fill(set, victim_way, addr, filled);
                self.dcache.write(set, victim_way, addr, data, size);
            }
        }
    }

    fn free_station(&mut self, source_station: u8, alloc_type: AllocType) {
        match alloc_type {
            AllocType::IntAlu | AllocType::CmpOnly => {
                if (source_station as usize) < self.rs_int_alu.len() {
                    self.rs_int_alu[source_station as usize].free();
                }
            }
            AllocType::FpAlu => self.rs_fp_alu.free(),
            AllocType::IntMul => self.rs_int_mul.free(),
            AllocType::FpMul => self.rs_fp_mul.free(),
            AllocType::Branch => self.rs_branch.free(),
            AllocType::Load => self.lb[source_station as usize].free(),
            AllocType::Store => self.sb[source_station as usize].free(),
        }
    }

    fn flush_pipeline(&mut self) {
        self.rob.flush();
        self.regfile.flush();
        self.flags.flush();
        for rs in &mut self.rs_int_alu {
            rs.free();
        }
        self.rs_fp_alu.free();
        self.rs_int_mul.free();
        self.rs_fp_mul.free();
        self.rs_branch.free();
        for sb in &mut self.sb {
            sb.free();
        }
        for lb in &mut self.lb {
            lb.free();
        }
        self.int_alu_hold = IntAluHold::default();
        self.fp_alu_unit.flush();
        self.int_mul_unit.flush();
        self.fp_mul_unit.flush();
        self.store_commit_phase = StoreCommitState::Idle;
    }

    fn arbitrate_cdb(&self) -> crate::tomasulo::cdb::CdbGrants {
        let mut requests = Vec::with_capacity(7);
        if self.int_alu_hold.busy {
            requests.push(CdbRequest {
                source: CdbSource::IntAlu,
                rob_tag: self.int_alu_hold.dest_rob,
                value: self.int_alu_hold.value,
                exception: 0,
                flags: self.int_alu_hold.flags.0,
                flags_valid: self.int_alu_hold.flags_valid,
            });
        }
        if self.fp_alu_unit.wants_cdb() {
            let (tag, value, flags, flags_valid, exception) = self.fp_alu_unit.cdb_payload();
            requests.push(CdbRequest {
                source: CdbSource::FpAlu,
                rob_tag: tag,
                value,
                exception,
                flags: flags.0,
                flags_valid,
            });
        }
        if self.int_mul_unit.wants_cdb() {
            let (tag, value, exception, flags) = self.int_mul_unit.cdb_payload();
            requests.push(CdbRequest {
                source: CdbSource::IntMul,
                rob_tag: tag,
                value,
                exception,
                flags: flags.0,
                flags_valid: true,
            });
        }
        if self.fp_mul_unit.wants_cdb() {
            let (tag, value, exception) = self.fp_mul_unit.cdb_payload();
            requests.push(CdbRequest {
                source: CdbSource::FpMul,
                rob_tag: tag,
                value,
                exception,
                flags: 0,
                flags_valid: false,
            });
        }
        for (i, lb) in self.lb.iter().enumerate() {
            if lb.wants_cdb() {
                let (value, exception) = lb.cdb_payload();
                let source = [CdbSource::Lb0, CdbSource::Lb1, CdbSource::Lb2][i];
                requests.push(CdbRequest {
                    source,
                    rob_tag: lb.dest_rob(),
                    value,
                    exception,
                    flags: 0,
                    flags_valid: false,
                });
            }
        }
        CdbArbiter::arbitrate(&requests)
    }

    fn broadcast(&mut self, req: CdbRequest) {
        self.rob.snoop_cdb(req.rob_tag, req.value, req.exception);
        if req.flags_valid {
            self.rob.snoop_cdb_flags(req.rob_tag, req.flags);
        }
        for rs in &mut self.rs_int_alu {
            rs.snoop_cdb(req.rob_tag, req.value);
            if req.flags_valid {
                rs.snoop_cdb_flags(req.rob_tag, req.flags);
            }
        }
        for rs in [&mut self.rs_fp_alu, &mut self.rs_int_mul, &mut self.rs_fp_mul, &mut self.rs_branch] {
            rs.snoop_cdb(req.rob_tag, req.value);
            if req.flags_valid {
                rs.snoop_cdb_flags(req.rob_tag, req.flags);
            }
        }
        for sb in &mut self.sb {
            sb.snoop_cdb(req.rob_tag, req.value);
        }
        for lb in &mut self.lb {
            lb.snoop_cdb(req.rob_tag, req.value);
        }

        match req.source {
            CdbSource::IntAlu => self.int_alu_hold = IntAluHold::default(),
            CdbSource::FpAlu => self.fp_alu_unit.on_cdb_accepted(),
            CdbSource::IntMul => self.int_mul_unit.on_cdb_accepted(),
            CdbSource::FpMul => self.fp_mul_unit.on_cdb_accepted(),
            CdbSource::Lb0 => self.lb[0].mark_cdb_granted(),
            CdbSource::Lb1 => self.lb[1].mark_cdb_granted(),
            CdbSource::Lb2 => self.lb[2].mark_cdb_granted(),
        }
    }

    fn settle_stations(&mut self) {
        self.refresh_stale_operands();

        for rs in &mut self.rs_int_alu {
            rs.settle();
        }
        self.rs_fp_alu.settle();
        self.rs_int_mul.settle();
        self.rs_fp_mul.settle();
        self.rs_branch.settle();
        for sb in &mut self.sb {
            sb.settle();
            sb.settle_data();
        }
        for lb in &mut self.lb {
            lb.settle();
        }
    }

    /// The fallback tier (§4.E step 2): re-polls the ROB for every station or
    /// buffer still waiting on an unresolved operand. Needed because a CDB
    /// broadcast is one-shot (`broadcast_cdb_grants`) — a station allocated
    /// after its producer already broadcast would otherwise never see that
    /// value again even though the ROB entry is still sitting there `ready`.
    fn refresh_stale_operands(&mut self) {
        for rs in &mut self.rs_int_alu {
            if let Some(tag) = rs.pending_vj_tag() {
                let (ready, value) = self.rob.forward(tag);
                if ready {
                    rs.refresh_stale_operand_j(value);
                }
            }
            if let Some(tag) = rs.pending_vk_tag() {
                let (ready, value) = self.rob.forward(tag);
                if ready {
                    rs.refresh_stale_operand_k(value);
                }
            }
        }
        for rs in [&mut self.rs_fp_alu, &mut self.rs_int_mul, &mut self.rs_fp_mul, &mut self.rs_branch] {
            if let Some(tag) = rs.pending_vj_tag() {
                let (ready, value) = self.rob.forward(tag);
                if ready {
                    rs.refresh_stale_operand_j(value);
                }
            }
            if let Some(tag) = rs.pending_vk_tag() {
                let (ready, value) = self.rob.forward(tag);
                if ready {
                    rs.refresh_stale_operand_k(value);
                }
            }
        }
        for lb in &mut self.lb {
            if let Some(tag) = lb.pending_base_tag() {
                let (ready, value) = self.rob.forward(tag);
                if ready {
                    lb.refresh_stale_base(value);
                }
            }
        }
        for sb in &mut self.sb {
            if let Some(tag) = sb.pending_base_tag() {
                let (ready, value) = self.rob.forward(tag);
                if ready {
                    sb.refresh_stale_base(value);
                }
            }
            if let Some(tag) = sb.pending_data_tag() {
                let (ready, value) = self.rob.forward(tag);
                if ready {
                    sb.refresh_stale_data(value);
                }
            }
        }
    }

    fn dispatch(&mut self) {
        // IntALU arbiter: RS0 > RS1.
        if !self.int_alu_hold.busy {
            for rs in &mut self.rs_int_alu {
                if rs.is_ready() {
                    let (vj, vk, flags_in) = rs.operands();
                    let carry_in = flags_in & 0b0010 != 0;
                    let r = int_alu::evaluate(rs.opcode(), vj, vk, carry_in);
                    self.int_alu_hold = IntAluHold {
                        busy: true,
                        dest_rob: rs.dest_rob(),
                        value: r.value,
                        flags: r.flags,
                        flags_valid: rs.shape().modifies_flags,
                    };
                    rs.grant();
                    break;
                }
            }
        }

        if self.fp_alu_unit.is_free() && self.rs_fp_alu.is_ready() {
            let (vj, vk, _) = self.rs_fp_alu.operands();
            self.fp_alu_unit.start(self.rs_fp_alu.opcode(), vj, vk, self.rs_fp_alu.dest_rob());
            self.rs_fp_alu.grant();
        }
        if self.int_mul_unit.is_free() && self.rs_int_mul.is_ready() {
            let (vj, vk, _) = self.rs_int_mul.operands();
            self.int_mul_unit.start(self.rs_int_mul.opcode(), vj, vk, self.rs_int_mul.dest_rob());
            self.rs_int_mul.grant();
        }
        if self.fp_mul_unit.is_free() && self.rs_fp_mul.is_ready() {
            let (vj, vk, _) = self.rs_fp_mul.operands();
            self.fp_mul_unit.start(self.rs_fp_mul.opcode(), vj, vk, self.rs_fp_mul.dest_rob());
            self.rs_fp_mul.grant();
        }
    }

    fn run_agu(&mut self) {
        let pending = [
            self.sb[0].wants_agu(),
            self.sb[1].wants_agu(),
            self.lb[0].wants_agu(),
            self.lb[1].wants_agu(),
            self.lb[2].wants_agu(),
        ];
        let grants = AguArbiter::grant(pending, [true, true]);
        let (upper, lower) = self.regfile.bounds();
        let bounds = crate::common::addr::MemRange::new(upper, lower);

        for (requester, _agu_id) in grants {
            match requester {
                agu::Requester::Sb0 => {
                    let (base, offset) = self.sb[0].agu_request();
                    let result = Agu::compute(AguRequest { base, offset }, bounds);
                    self.sb[0].agu_done(result);
                }
                agu::Requester::Sb1 => {
                    let (base, offset) = self.sb[1].agu_request();
                    let result = Agu::compute(AguRequest { base, offset }, bounds);
                    self.sb[1].agu_done(result);
                }
                agu::Requester::Lb0 => {
                    let (base, offset) = self.lb[0].agu_request();
                    let result = Agu::compute(AguRequest { base, offset }, bounds);
                    self.lb[0].agu_done(result);
                }
                agu::Requester::Lb1 => {
                    let (base, offset) = self.lb[1].agu_request();
                    let result = Agu::compute(AguRequest { base, offset }, bounds);
                    self.lb[1].agu_done(result);
                }
                agu::Requester::Lb2 => {
                    let (base, offset) = self.lb[2].agu_request();
                    let result = Agu::compute(AguRequest { base, offset }, bounds);
                    self.lb[2].agu_done(result);
                }
            }
        }

        for sb in &mut self.sb {
            if sb.wants_complete() {
                let (addr, data, segfault) = sb.complete_payload();
                let tag = sb.dest_rob();
                if segfault {
                    let _ = self.rob.mark_exception(tag, crate::error::SimFault::SEGFAULT_CODE);
                } else {
                    let _ = self.rob.snoop_store_complete(tag, addr, data);
                }
                sb.mark_completed();
            }
        }
    }

    fn run_memory(&mut self) {
        if self.dcache_access != DcacheAccessState::Idle {
            if let DcacheAccessState::Missed { remaining } = &mut self.dcache_access {
                *remaining -= 1;
                if *remaining == 0 {
                    self.dcache_access = DcacheAccessState::Idle;
                }
            }
            return;
        }

        let pending = [
            false, // StoreCommit is handled synchronously in `try_commit`.
            self.lb[0].wants_memory(),
            self.lb[1].wants_memory(),
            self.lb[2].wants_memory(),
        ];
        let Some(winner) = MemoryArbiter::grant(pending) else {
            return;
        };

        let idx = match winner {
            MemRequester::Lb0 => 0,
            MemRequester::Lb1 => 1,
            MemRequester::Lb2 => 2,
            MemRequester::StoreCommit => return,
        };
        let addr = self.lb[idx].memory_address();
        match self.dcache.lookup(addr) {
            Lookup::Hit { set, way } => {
                let value = self.dcache.read(set, way, addr, 8);
                self.lb[idx].memory_done(value);
            }
            Lookup::Miss { .. } => {
                self.dcache_access = DcacheAccessState::Missed {
                    remaining: self.config.miss_latency_cycles,
                };
            }
        }
    }

    fn run_branch(&mut self, flush: &mut bool, redirect_target: &mut u64) {
        if !self.rs_branch.is_busy() {
            return;
        }
        // Branch operands were latched as (Vj=flags-as-value placeholder, Vk=target).
        let (_, target, flags_value) = self.rs_branch.operands();
        let flags = crate::tomasulo::flags::Flags(flags_value);
        let predicted_taken = false;
        let result = branch::evaluate(self.rs_branch.opcode(), flags, target, predicted_taken);
        if self.rs_branch.is_ready() {
            self.rob.snoop_branch(self.rs_branch.dest_rob(), result.mispredict, result.target);
            if result.mispredict {
                *flush = true;
                *redirect_target = result.target;
            }
            self.rs_branch.grant();
        }
    }

    /// Attempts to issue this cycle's fetched instruction.
    ///
    /// Returns `true` only if the fetched word was actually consumed (a NOP
    /// counts as consumed; a stalled resource does not), so the caller knows
    /// whether `StallIF` must hold the PC this cycle.
    fn try_issue(&mut self) -> bool {
        let fetch_result = self.fetch.poll(&self.dram);
        if !fetch_result.ready {
            return false;
        }
        let raw = RawInstruction::from_word(fetch_result.word);
        let decoded = isa::decode(raw.opcode);

        if decoded.is_nop {
            return true;
        }

        if self.rob.is_full() {
            return false;
        }

        match decoded.alloc_type {
            AllocType::Load => self.try_issue_load(raw, &decoded, fetch_result.pc),
            AllocType::Store => self.try_issue_store(raw, &decoded, fetch_result.pc),
            _ => self.try_issue_generic(raw, &decoded, fetch_result.pc),
        }
    }

    /// Checks a just-read register port against the ROB's operand-forwarding
    /// tier: if the port is waiting on a tag whose producer already
    /// broadcast (ready) but hasn't committed yet, resolve it here rather
    /// than latching a tag that will never broadcast again.
    fn resolve_port(&self, port: crate::tomasulo::regfile::ReadPort) -> crate::tomasulo::regfile::ReadPort {
        if !port.qi_valid {
            return port;
        }
        let (ready, value) = self.rob.forward(port.qi);
        if ready {
            crate::tomasulo::regfile::ReadPort {
                value,
                qi: 0,
                qi_valid: false,
            }
        } else {
            port
        }
    }

    /// Mirrors [`Self::resolve_port`] for the flags operand.
    fn resolve_flags_port(
        &self,
        flags_port: Option<(crate::tomasulo::flags::Flags, u8, bool)>,
    ) -> Option<(crate::tomasulo::flags::Flags, u8, bool)> {
        flags_port.map(|(flags, qi, qi_valid)| {
            if !qi_valid {
                return (flags, qi, qi_valid);
            }
            let (ready, value) = self.rob.forward_flags(qi);
            if ready {
                (crate::tomasulo::flags::Flags(value), 0, false)
            } else {
                (flags, qi, qi_valid)
            }
        })
    }

    fn try_issue_generic(&mut self, raw: RawInstruction, decoded: &DecodedControl, pc: u64) -> bool {
        let Some(kind) = kind_for(decoded.alloc_type) else {
            return false;
        };
        let station_free = match kind {
            StationKind::IntAlu => self.rs_int_alu.iter().any(|s| !s.is_busy()),
            StationKind::FpAlu => !self.rs_fp_alu.is_busy(),
            StationKind::IntMul => !self.rs_int_mul.is_busy(),
            StationKind::FpMul => !self.rs_fp_mul.is_busy(),
            StationKind::Branch => !self.rs_branch.is_busy(),
        };
        if !station_free {
            return false;
        }

        let tag = self.rob.next_tag();
        let rn_port = self.resolve_port(self.regfile.read(raw.rn as usize));
        let rm_port = self.resolve_port(self.regfile.read(raw.rm as usize));
        let imm = if is_fp_immediate(raw.opcode) {
            crate::common::bits::f32_bits_to_f64_bits(raw.imm)
        } else {
            crate::common::bits::sign_extend_32_to_64(raw.imm)
        };
        let flags_port = self.resolve_flags_port(decoded.needs_flags.then(|| self.flags.read()));

        let shape = AllocShape {
            mov_like: matches!(raw.opcode, op::MOV | op::MOVI | op::MVN | op::MVNI | op::FMOVI | op::FMVNI)
                || (0x29..=0x30).contains(&raw.opcode)
                || (0x53..=0x5A).contains(&raw.opcode),
            use_imm: decoded.use_imm,
            modifies_flags: decoded.modifies_flags,
            needs_flags: decoded.needs_flags,
            is_cmp_only: decoded.is_cmp_only,
        };

        if decoded.is_branch {
            let target = pc.wrapping_add(crate::common::bits::sign_extend_32_to_64(raw.imm));
            let branch_shape = AllocShape {
                mov_like: true,
                use_imm: true,
                modifies_flags: false,
                needs_flags: decoded.needs_flags,
                is_cmp_only: false,
            };
            self.rs_branch.allocate(
                raw.opcode,
                tag,
                pc,
                branch_shape,
                crate::tomasulo::regfile::ReadPort::default(),
                crate::tomasulo::regfile::ReadPort::default(),
                target,
                flags_port,
            );
            self.rob.allocate(RobEntry {
                alloc_type: AllocType::Branch,
                pc,
                opcode: raw.opcode,
                source_station: 0,
                ..RobEntry::default()
            });
            return true;
        }

        let station_idx = match kind {
            StationKind::IntAlu => self.rs_int_alu.iter().position(|s| !s.is_busy()).unwrap_or(0),
            _ => 0,
        };
        {
            let station: &mut Station = match kind {
                StationKind::IntAlu => &mut self.rs_int_alu[station_idx],
                StationKind::FpAlu => &mut self.rs_fp_alu,
                StationKind::IntMul => &mut self.rs_int_mul,
                StationKind::FpMul => &mut self.rs_fp_mul,
                StationKind::Branch => unreachable!("branch handled above"),
            };
            station.allocate(raw.opcode, tag, pc, shape, rn_port, rm_port, imm, flags_port);
        }

        if decoded.writes_rd {
            self.regfile.set_tag(raw.rd as usize, tag);
        }
        if decoded.modifies_flags {
            self.flags.set_tag(tag);
        }

        self.rob.allocate(RobEntry {
            alloc_type: decoded.alloc_type,
            dest_reg: raw.rd,
            pc,
            opcode: raw.opcode,
            modifies_flags: decoded.modifies_flags,
            source_station: station_idx as u8,
            ..RobEntry::default()
        });
        true
    }

    fn try_issue_load(&mut self, raw: RawInstruction, decoded: &DecodedControl, pc: u64) -> bool {
        let Some(idx) = self.lb.iter().position(|l| !l.is_busy()) else {
            return false;
        };
        let tag = self.rob.next_tag();
        let base_port = self.resolve_port(self.regfile.read(raw.rn as usize));
        let offset = crate::common::bits::sign_extend_32_to_64(raw.imm);
        self.lb[idx].allocate(tag, base_port, offset);
        self.regfile.set_tag(raw.rd as usize, tag);
        self.rob.allocate(RobEntry {
            alloc_type: AllocType::Load,
            dest_reg: raw.rd,
            pc,
            opcode: raw.opcode,
            source_station: idx as u8,
            ..RobEntry::default()
        });
        let _ = decoded;
        true
    }

    fn try_issue_store(&mut self, raw: RawInstruction, _decoded: &DecodedControl, pc: u64) -> bool {
        let Some(idx) = self.sb.iter().position(|s| !s.is_busy()) else {
            return false;
        };
        let tag = self.rob.next_tag();
        let base_port = self.resolve_port(self.regfile.read(raw.rn as usize));
        let data_port = self.resolve_port(self.regfile.read(raw.rd as usize));
        let offset = crate::common::bits::sign_extend_32_to_64(raw.imm);
        self.sb[idx].allocate(tag, base_port, offset, data_port);
        self.rob.allocate(RobEntry {
            alloc_type: AllocType::Store,
            pc,
            opcode: raw.opcode,
            source_station: idx as u8,
            ..RobEntry::default()
        });
        true
    }
}

/// Whether `opcode`'s 32-bit immediate field encodes an IEEE-754 single that
/// must be widened to a double bit pattern rather than sign-extended.
fn is_fp_immediate(opcode: u8) -> bool {
    matches!(opcode, 0x23..=0x27 | 0x42..=0x44 | 0x52..=0x5A)
}
