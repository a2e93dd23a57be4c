//! Shared coherence types for the four-processor MESI system (§3, Core B).

use serde::Serialize;

/// Bytes per L1 line. Architecturally fixed; `MesiConfig::l1_line_bytes`
/// exists for symmetry with the rest of the config surface but is not honored
/// here, the same way the reservation-station count and ROB width are fixed
/// in Core A despite being named in `TomasuloConfig`.
pub const LINE_BYTES: usize = 32;

/// Coherence state of one cached line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum MesiState {
    /// Not present / not valid.
    #[default]
    Invalid,
    /// Present, clean, possibly also cached elsewhere.
    Shared,
    /// Present, clean, guaranteed not cached elsewhere.
    Exclusive,
    /// Present, dirty, guaranteed not cached elsewhere.
    Modified,
}

/// Bus transaction kinds an L1 may request (§3, §4.L).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusCommand {
    /// Read miss: the requester wants to read a line it does not hold.
    BusRead,
    /// Write miss: the requester wants to read-and-own a line it does not hold.
    BusReadExclusive,
    /// Write hit in Shared: the requester already has the data, wants ownership.
    BusUpgrade,
    /// A dirty victim line being written back to DRAM.
    WriteBack,
}

/// One CPU-side memory access a PE driver hands its L1 (§2, Core B: "command
/// generators that emit load/store requests with address + data + read/write + size").
#[derive(Clone, Copy, Debug)]
pub struct CpuRequest {
    /// Byte address within the 4 KB physical address space.
    pub address: u16,
    /// `true` for a store, `false` for a load.
    pub write: bool,
    /// Store data (ignored for loads).
    pub data: u64,
    /// Access width in bytes (1 or 8).
    pub size: u8,
}

/// Per-snooper response collected during one bus broadcast (§4.L).
#[derive(Clone, Copy, Debug, Default)]
pub struct SnoopResponse {
    /// The snooper held the line Shared or Exclusive and downgraded/invalidated it.
    pub shared: bool,
    /// The snooper held the line Modified and is supplying `data` via cache-to-cache transfer.
    pub modified: bool,
    /// The snooper invalidated its copy in response to `BusReadExclusive`/`BusUpgrade`.
    pub invalidation_ack: bool,
    /// The line contents, present only when `modified` is set.
    pub data: Option<[u8; LINE_BYTES]>,
}
