//! Shared test infrastructure for the integration suite.

/// A tiny in-repo instruction-word builder and run-to-halt/quiescence drivers.
///
/// This is deliberately not a general assembler (that stays out of scope);
/// it only knows how to pack the handful of opcodes the scenario tests need
/// into raw 64-bit words.
pub mod harness;
