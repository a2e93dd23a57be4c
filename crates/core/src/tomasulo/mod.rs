//! Cycle-accurate Tomasulo out-of-order superscalar core (§3-§4, Core A).
//!
//! Submodules mirror the reference prototype's component boundaries:
//! decode (`isa`), rename state (`regfile`, `flags`), the reorder buffer
//! (`rob`), the generic reservation station (`reservation_station`),
//! execution units (`int_alu`, `int_mul`, `fp_alu`, `fp_mul`, `branch`),
//! memory-side buffers and arbiters (`agu`, `store_buffer`, `load_buffer`,
//! `memory`, `cdb`), fetch (`fetch`), and retirement (`commit`).
//! [`coordinator`] wires all of them into one stepped core.

pub mod agu;
pub mod branch;
pub mod cdb;
pub mod commit;
pub mod coordinator;
pub mod fetch;
pub mod flags;
pub mod fp_alu;
pub mod fp_mul;
pub mod int_alu;
pub mod int_mul;
pub mod isa;
pub mod load_buffer;
pub mod memory;
pub mod regfile;
pub mod reservation_station;
pub mod rob;
pub mod store_buffer;

pub use coordinator::{StepOutcome, TomasuloCore};
