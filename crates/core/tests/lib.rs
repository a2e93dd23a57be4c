//! Integration test suite for both simulation cores.
//!
//! Organizes shared test infrastructure and fine-grained unit coverage for
//! the Tomasulo and MESI cores, one tree mirroring `archsim_core`'s own
//! `tomasulo`/`mesi` module split.

/// Shared test infrastructure: instruction-word assembly and run-to-halt /
/// run-to-quiescence drivers.
pub mod common;

/// Focused unit and scenario tests for each core.
pub mod unit;
