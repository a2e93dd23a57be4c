//! Address generation units and their arbiter (§4.F).

use crate::common::addr::{BoundsCheck, MemRange};

/// Identifies the requester of an AGU computation, used to route the result
/// back to the originating buffer (0=SB0, 1=SB1, 2=LB0, 3=LB1, 4=LB2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requester {
    /// Store buffer 0.
    Sb0,
    /// Store buffer 1.
    Sb1,
    /// Load buffer 0.
    Lb0,
    /// Load buffer 1.
    Lb1,
    /// Load buffer 2.
    Lb2,
}

impl Requester {
    /// Fixed priority order for the AGU arbiter: stores first, to minimize
    /// commit-blocking, then loads in buffer order.
    pub const PRIORITY: [Requester; 5] = [
        Requester::Sb0,
        Requester::Sb1,
        Requester::Lb0,
        Requester::Lb1,
        Requester::Lb2,
    ];
}

/// A pending address-computation request.
#[derive(Clone, Copy, Debug)]
pub struct AguRequest {
    /// Base register value.
    pub base: u64,
    /// Immediate/offset.
    pub offset: u64,
}

/// Result of an AGU computation, routed back to the requester.
#[derive(Clone, Copy, Debug)]
pub struct AguResult {
    /// Computed address.
    pub address: u64,
    /// Whether the address lies outside `[UPPER, LOWER]`.
    pub segfault: bool,
}

/// A single address generation unit: purely combinational `base + offset`
/// plus a bounds check.
#[derive(Clone, Copy, Debug, Default)]
pub struct Agu;

impl Agu {
    /// Computes `base + offset` and checks it against `bounds`.
    #[must_use]
    pub fn compute(request: AguRequest, bounds: MemRange) -> AguResult {
        let address = request.base.wrapping_add(request.offset);
        let segfault = BoundsCheck::check(bounds, address).is_fault();
        AguResult { address, segfault }
    }
}

/// Gathers requests from up to five sources and dispatches up to two per
/// cycle onto two free AGUs, in the fixed priority order (§4.F).
#[derive(Clone, Copy, Debug, Default)]
pub struct AguArbiter;

impl AguArbiter {
    /// Picks up to two requesters (in priority order) to grant this cycle.
    /// `pending` reports, for each requester, whether it currently has an
    /// outstanding request; `agu_free` reports whether AGU0/AGU1 are free.
    #[must_use]
    pub fn grant(pending: [bool; 5], agu_free: [bool; 2]) -> Vec<(Requester, usize)> {
        let mut grants = Vec::with_capacity(2);
        let mut free_agus = agu_free
            .iter()
            .enumerate()
            .filter_map(|(i, &free)| free.then_some(i));
        for (idx, &is_pending) in pending.iter().enumerate() {
            if !is_pending {
                continue;
            }
            let Some(agu) = free_agus.next() else {
                break;
            };
            grants.push((Requester::PRIORITY[idx], agu));
        }
        grants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_detects_segfault_outside_bounds() {
        let bounds = MemRange::new(0x100, 0x200);
        let r = Agu::compute(
            AguRequest {
                base: 0x50,
                offset: 0,
            },
            bounds,
        );
        assert!(r.segfault);
        assert_eq!(r.address, 0x50);
    }

    #[test]
    fn arbiter_respects_store_before_load_priority() {
        let pending = [true, true, true, false, false];
        let grants = AguArbiter::grant(pending, [true, true]);
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[0].0, Requester::Sb0);
        assert_eq!(grants[1].0, Requester::Sb1);
    }

    #[test]
    fn arbiter_only_grants_as_many_as_free_agus() {
        let pending = [true, true, true, true, true];
        let grants = AguArbiter::grant(pending, [true, false]);
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].0, Requester::Sb0);
    }
}
