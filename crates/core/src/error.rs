//! Error handling for both simulation cores, per §7.
//!
//! Two error categories exist: [`SimFault`] is a simulated-program exception
//! that rides along with an in-flight instruction and is reported when it
//! commits, and [`InvariantViolation`] is a simulator bug — a condition the
//! design asserts can never happen.

use thiserror::Error;

/// A simulated-program exception, encoded as the 4-bit code carried by ROB
/// entries and CDB values (§7.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SimFault {
    /// Code 1: the decoder could not classify the opcode; it was treated as a NOP.
    #[error("illegal opcode at pc={pc:#018x}")]
    IllegalOpcode {
        /// Program counter of the offending instruction.
        pc: u64,
    },
    /// Code 2: an AGU computed an address outside `[UPPER, LOWER]`.
    #[error("segmentation fault at pc={pc:#018x} addr={addr:#018x}")]
    Segfault {
        /// Program counter of the offending instruction.
        pc: u64,
        /// Faulting address.
        addr: u64,
    },
    /// Code 3: integer division or remainder by zero.
    #[error("integer divide by zero at pc={pc:#018x}")]
    IntDivideByZero {
        /// Program counter of the offending instruction.
        pc: u64,
    },
    /// Code 4: floating-point division by zero.
    #[error("floating-point divide by zero at pc={pc:#018x}")]
    FpDivideByZero {
        /// Program counter of the offending instruction.
        pc: u64,
    },
    /// Code 5: floating-point square root of a negative operand.
    #[error("floating-point invalid operation (negative sqrt) at pc={pc:#018x}")]
    FpInvalid {
        /// Program counter of the offending instruction.
        pc: u64,
    },
}

impl SimFault {
    /// Exception code for [`SimFault::IllegalOpcode`], for call sites that
    /// only have the code (e.g. a buffer latching a fault before a `SimFault`
    /// value can be constructed with its `pc`).
    pub const ILLEGAL_OPCODE_CODE: u8 = 1;
    /// Exception code for [`SimFault::Segfault`].
    pub const SEGFAULT_CODE: u8 = 2;
    /// Exception code for [`SimFault::IntDivideByZero`].
    pub const INT_DIVIDE_BY_ZERO_CODE: u8 = 3;
    /// Exception code for [`SimFault::FpDivideByZero`].
    pub const FP_DIVIDE_BY_ZERO_CODE: u8 = 4;
    /// Exception code for [`SimFault::FpInvalid`].
    pub const FP_INVALID_CODE: u8 = 5;

    /// The 4-bit exception code carried on the CDB and in ROB entries.
    ///
    /// `0` ("none") is represented as `Option::None` at the call sites that
    /// carry this code; this method only covers the defined nonzero codes.
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            Self::IllegalOpcode { .. } => Self::ILLEGAL_OPCODE_CODE,
            Self::Segfault { .. } => Self::SEGFAULT_CODE,
            Self::IntDivideByZero { .. } => Self::INT_DIVIDE_BY_ZERO_CODE,
            Self::FpDivideByZero { .. } => Self::FP_DIVIDE_BY_ZERO_CODE,
            Self::FpInvalid { .. } => Self::FP_INVALID_CODE,
        }
    }

    /// Program counter of the faulting instruction.
    #[must_use]
    pub fn pc(&self) -> u64 {
        match self {
            Self::IllegalOpcode { pc }
            | Self::Segfault { pc, .. }
            | Self::IntDivideByZero { pc }
            | Self::FpDivideByZero { pc }
            | Self::FpInvalid { pc } => *pc,
        }
    }
}

/// A simulator-invariant violation (§7.2): a programmer error that is never
/// recovered. In debug builds these are additionally raised via
/// `debug_assert!` at the call site before being returned here.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A ring buffer (ROB, store buffer, load buffer) was full when the
    /// control unit believed it had room.
    #[error("ring buffer '{which}' unexpectedly full")]
    RingBufferFull {
        /// Name of the structure that overflowed.
        which: &'static str,
    },
    /// Two producers broadcast the same ROB tag on the CDBs in a single cycle.
    #[error("duplicate CDB tag {tag} broadcast in the same cycle")]
    DuplicateCdbTag {
        /// The tag that was broadcast twice.
        tag: u8,
    },
    /// A store buffer signalled `StoreComplete` for a ROB entry that was not busy.
    #[error("StoreComplete asserted for non-busy ROB entry {rob_tag}")]
    StoreCompleteForIdleEntry {
        /// The ROB tag the store buffer claimed.
        rob_tag: u8,
    },
    /// The bus arbiter granted the bus with no requester asserting a request.
    #[error("bus grant issued with no pending requester")]
    GrantWithNoRequester,
}

/// Top-level error type for fallible coordinator and CLI operations.
#[derive(Debug, Error)]
pub enum SimError {
    /// A simulated-program exception reached commit.
    #[error(transparent)]
    Fault(#[from] SimFault),
    /// A simulator-invariant was violated.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    /// The supplied program image could not be loaded.
    #[error("failed to load program image: {0}")]
    Load(String),
}
