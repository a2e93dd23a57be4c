//! Computer-architecture visualizer simulation cores.
//!
//! This crate implements two independently steppable, cycle-accurate
//! simulation cores:
//! 1. **Tomasulo (`tomasulo`):** an out-of-order superscalar core with
//!    register renaming via a reorder buffer, reservation stations per
//!    functional-unit class, dual common data buses, and a reorder-buffered
//!    store queue.
//! 2. **MESI (`mesi`):** a four-processor shared-memory multiprocessor with
//!    private write-back L1 caches, a round-robin shared bus arbiter with
//!    cache-to-cache forwarding, and a DRAM backing store.
//!
//! `common` holds address-bounds and bit-manipulation helpers shared by both
//! cores; `config` holds their (de)serializable parameter structs; `control`
//! defines the command set the UI layer steps either core with; `error`
//! defines the program-visible fault and simulator-invariant error types;
//! `snapshot` exposes read-only, serializable views of either core's state
//! for the UI to render.

/// Address-bounds and bit-manipulation helpers shared by both cores.
pub mod common;
/// Simulation configuration (`TomasuloConfig`, `MesiConfig`).
pub mod config;
/// The command set the UI layer steps either core with.
pub mod control;
/// Program-visible faults and simulator-invariant errors.
pub mod error;
/// Four-processor MESI shared-memory multiprocessor core.
pub mod mesi;
/// Read-only, serializable snapshots of either core's state.
pub mod snapshot;
/// Cycle-accurate Tomasulo out-of-order superscalar core.
pub mod tomasulo;

/// Tomasulo core parameters; use `TomasuloConfig::default()` or deserialize.
pub use crate::config::{MesiConfig, TomasuloConfig};
/// The command set accepted by both cores' `step`/`run` drivers.
pub use crate::control::ControlCommand;
/// Program-visible fault and simulator-invariant error types.
pub use crate::error::{SimError, SimFault};
/// Four-processor MESI core; construct with `MesiSystem::new`.
pub use crate::mesi::MesiSystem;
/// Tomasulo out-of-order core; construct with `TomasuloCore::new`.
pub use crate::tomasulo::TomasuloCore;
