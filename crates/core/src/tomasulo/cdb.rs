//! Common Data Bus arbiter (§4.F): two buses, seven requesters, fixed
//! priority `IntALU > FPALU > IntMUL > FPMUL > LB0 > LB1 > LB2`. Loads never
//! carry flags.

/// Identifies a CDB requester.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CdbSource {
    /// Integer ALU.
    IntAlu,
    /// Floating-point ALU.
    FpAlu,
    /// Integer multiply/divide unit.
    IntMul,
    /// Floating-point multiply/divide/sqrt unit.
    FpMul,
    /// Load buffer 0.
    Lb0,
    /// Load buffer 1.
    Lb1,
    /// Load buffer 2.
    Lb2,
}

impl CdbSource {
    /// Fixed arbiter priority order (§4.F).
    pub const PRIORITY: [CdbSource; 7] = [
        CdbSource::IntAlu,
        CdbSource::FpAlu,
        CdbSource::IntMul,
        CdbSource::FpMul,
        CdbSource::Lb0,
        CdbSource::Lb1,
        CdbSource::Lb2,
    ];
}

/// One pending broadcast request.
#[derive(Clone, Copy, Debug)]
pub struct CdbRequest {
    /// Source of the request.
    pub source: CdbSource,
    /// Destination ROB tag.
    pub rob_tag: u8,
    /// Result value (meaningless for a pure-flags or exception-only result).
    pub value: u64,
    /// 4-bit exception code, `0` if none.
    pub exception: u8,
    /// Result flags, if this producer writes flags.
    pub flags: u8,
    /// Whether `flags` is meaningful; always `false` for loads.
    pub flags_valid: bool,
}

/// Outcome of one arbitration cycle.
#[derive(Clone, Copy, Debug, Default)]
pub struct CdbGrants {
    /// Winner broadcast on CDB-A, if any.
    pub bus_a: Option<CdbRequest>,
    /// Winner broadcast on CDB-B, if any.
    pub bus_b: Option<CdbRequest>,
}

impl CdbGrants {
    /// Whether `source` lost arbitration this cycle and must hold its
    /// request (`CDBStall`) for the next cycle.
    #[must_use]
    pub fn stalled(&self, source: CdbSource, requested: bool) -> bool {
        requested && !self.granted(source)
    }

    fn granted(&self, source: CdbSource) -> bool {
        self.bus_a.is_some_and(|r| r.source == source) || self.bus_b.is_some_and(|r| r.source == source)
    }
}

/// The two-bus arbiter: picks up to two winners per cycle in fixed priority order.
#[derive(Clone, Copy, Debug, Default)]
pub struct CdbArbiter;

impl CdbArbiter {
    /// Arbitrates this cycle's requests, in priority order regardless of
    /// the order they appear in `requests`.
    #[must_use]
    pub fn arbitrate(requests: &[CdbRequest]) -> CdbGrants {
        let mut ordered: Vec<&CdbRequest> = CdbSource::PRIORITY
            .iter()
            .filter_map(|src| requests.iter().find(|r| r.source == *src))
            .collect();
        let bus_a = ordered.first().copied().copied();
        let bus_b = if ordered.len() > 1 {
            ordered.drain(1..2).next().copied()
        } else {
            None
        };
        CdbGrants { bus_a, bus_b }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(source: CdbSource, rob_tag: u8) -> CdbRequest {
        CdbRequest {
            source,
            rob_tag,
            value: 0,
            exception: 0,
            flags: 0,
            flags_valid: false,
        }
    }

    #[test]
    fn priority_order_picks_int_alu_and_fp_alu_first() {
        let requests = vec![req(CdbSource::Lb0, 1), req(CdbSource::IntAlu, 2), req(CdbSource::FpAlu, 3)];
        let grants = CdbArbiter::arbitrate(&requests);
        assert_eq!(grants.bus_a.unwrap().source, CdbSource::IntAlu);
        assert_eq!(grants.bus_b.unwrap().source, CdbSource::FpAlu);
        assert!(grants.stalled(CdbSource::Lb0, true));
    }

    #[test]
    fn single_requester_only_occupies_bus_a() {
        let requests = vec![req(CdbSource::Lb2, 4)];
        let grants = CdbArbiter::arbitrate(&requests);
        assert_eq!(grants.bus_a.unwrap().source, CdbSource::Lb2);
        assert!(grants.bus_b.is_none());
    }
}
