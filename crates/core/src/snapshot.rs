//! Read-only, serializable views of either core's state (§6).
//!
//! Neither core hands the UI a live reference into its own internals; the
//! boundary is a plain data snapshot built fresh on request by
//! [`crate::tomasulo::TomasuloCore::snapshot`] and
//! [`crate::mesi::MesiSystem::snapshot`]. Keeping that conversion next to
//! each core (rather than here) means these types stay free of any borrow on
//! the core that produced them.

use serde::Serialize;

use crate::tomasulo::flags::Flags;
use crate::tomasulo::load_buffer::LbState;
use crate::tomasulo::memory::LineSnapshot;
use crate::tomasulo::regfile::RegSlot;
use crate::tomasulo::reservation_station::RsState;
use crate::tomasulo::rob::RobEntry;
use crate::tomasulo::store_buffer::SbState;

/// One reservation station's occupancy, for the UI.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct StationSnapshot {
    /// Whether the station holds an instruction.
    pub busy: bool,
    /// Lifecycle state.
    pub state: RsState,
    /// Destination ROB tag, meaningless if `!busy`.
    pub dest_rob: u8,
    /// Opcode of the occupying instruction.
    pub opcode: u8,
    /// Program counter of the occupying instruction.
    pub pc: u64,
}

/// The two integer-ALU stations plus the four single-instance stations.
#[derive(Clone, Debug, Serialize)]
pub struct ReservationStationSnapshots {
    /// `RS0`/`RS1` (integer ALU, arbitrated RS0 > RS1 on dispatch).
    pub int_alu: Vec<StationSnapshot>,
    /// FP ALU station.
    pub fp_alu: StationSnapshot,
    /// Integer MUL/DIV station.
    pub int_mul: StationSnapshot,
    /// FP MUL/DIV/SQRT station.
    pub fp_mul: StationSnapshot,
    /// Branch station.
    pub branch: StationSnapshot,
}

/// One store-buffer entry's occupancy.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct StoreBufferSnapshot {
    /// Whether the entry holds an in-flight store.
    pub busy: bool,
    /// Lifecycle state.
    pub state: SbState,
    /// Destination ROB tag, meaningless if `!busy`.
    pub dest_rob: u8,
}

/// One load-buffer entry's occupancy.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct LoadBufferSnapshot {
    /// Whether the entry holds an in-flight load.
    pub busy: bool,
    /// Lifecycle state.
    pub state: LbState,
    /// Destination ROB tag, meaningless if `!busy`.
    pub dest_rob: u8,
}

/// Occupancy of the three multi-cycle functional units (the IntALU is
/// single-cycle and only ever holds an output waiting for the CDB).
#[derive(Clone, Copy, Debug, Serialize)]
pub struct FunctionalUnitSnapshots {
    /// Whether the integer ALU's output hold register has a result waiting for the CDB.
    pub int_alu_busy: bool,
    /// Occupancy of the FP ALU's three pipeline stages, oldest job first.
    pub fp_alu_stages: [bool; 3],
    /// Whether the integer MUL/DIV unit has a job in flight.
    pub int_mul_busy: bool,
    /// Cycles left on that job, meaningless if `!int_mul_busy`.
    pub int_mul_cycles_remaining: u32,
    /// Whether the FP MUL/DIV/SQRT unit has a job in flight.
    pub fp_mul_busy: bool,
    /// Cycles left on that job, meaningless if `!fp_mul_busy`.
    pub fp_mul_cycles_remaining: u32,
}

/// One instruction that retired, for the UI's recent-retirement list.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct RetiredInstruction {
    /// Cycle it committed on.
    pub cycle: u64,
    /// Its program counter.
    pub pc: u64,
    /// Its opcode.
    pub opcode: u8,
}

/// A complete, point-in-time view of the Tomasulo core.
#[derive(Clone, Debug, Serialize)]
pub struct TomasuloSnapshot {
    /// Cycles advanced since construction or the last reset.
    pub cycle: u64,
    /// Current program counter.
    pub pc: u64,
    /// Whether the core has halted.
    pub halted: bool,
    /// The sixteen architectural registers, in index order.
    pub registers: Vec<RegSlot>,
    /// Architectural N/Z/C/V flags.
    pub flags: Flags,
    /// In-flight ROB entries, oldest first.
    pub rob: Vec<RobEntry>,
    /// Reservation-station occupancy.
    pub reservation_stations: ReservationStationSnapshots,
    /// Store-buffer occupancy.
    pub store_buffers: Vec<StoreBufferSnapshot>,
    /// Load-buffer occupancy.
    pub load_buffers: Vec<LoadBufferSnapshot>,
    /// Multi-cycle functional-unit pipeline occupancy.
    pub functional_units: FunctionalUnitSnapshots,
    /// Instruction cache lines.
    pub icache: Vec<Vec<LineSnapshot>>,
    /// Data cache lines.
    pub dcache: Vec<Vec<LineSnapshot>>,
    /// The most recently retired instructions, oldest first.
    pub recent_retirements: Vec<RetiredInstruction>,
}

/// A complete, point-in-time view of the MESI multiprocessor.
#[derive(Clone, Debug, Serialize)]
pub struct MesiSnapshot {
    /// Cycles (agent iterations) advanced since construction or the last reset.
    pub cycle: u64,
    /// Each PE's L1 lines, indexed `[pe][set][way]`.
    pub l1s: Vec<Vec<Vec<crate::mesi::l1::Line>>>,
    /// Full DRAM contents.
    pub dram: Vec<u8>,
    /// Analysis counters.
    pub counters: crate::mesi::counters::CounterSnapshot,
}
