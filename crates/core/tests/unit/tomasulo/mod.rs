//! Tomasulo core test suite.

/// Straight-line integer arithmetic and the flags it produces.
pub mod arithmetic;
/// Conditional loops and branch misprediction recovery.
pub mod control_flow;
/// Store/load round trips through the D-cache.
pub mod memory;
/// Determinism property tests over randomly generated straight-line programs.
pub mod properties;
