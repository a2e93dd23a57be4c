use archsim_core::mesi::types::{CpuRequest, MesiState};
use archsim_core::mesi::MesiSystem;
use archsim_core::MesiConfig;

use crate::common::harness::line_for;

/// PE0 writes a line to Modified, then PE1 read-misses the same address:
/// PE0 must forward its dirty data via cache-to-cache transfer and downgrade
/// to Shared, and PE1 must observe the forwarded value rather than whatever
/// (stale) contents DRAM holds.
#[test]
fn read_miss_against_a_modified_owner_forwards_and_downgrades() {
    let mut system = MesiSystem::new(MesiConfig::default());

    system.submit(
        0,
        CpuRequest {
            address: 0,
            write: true,
            data: 0xDEAD_BEEF,
            size: 8,
        },
    );
    system.step_to_quiescence();

    let pe0_line = line_for(&system.l1_snapshot(0), 0);
    assert_eq!(pe0_line.state, MesiState::Modified);

    system.submit(
        1,
        CpuRequest {
            address: 0,
            write: false,
            data: 0,
            size: 8,
        },
    );
    system.step_to_quiescence();

    assert_eq!(line_for(&system.l1_snapshot(0), 0).state, MesiState::Shared);
    assert_eq!(line_for(&system.l1_snapshot(1), 0).state, MesiState::Shared);
    assert_eq!(system.load_result(1), 0xDEAD_BEEF);
}

/// A read miss against a line nobody else holds lands Exclusive, not Shared:
/// the fast path for a cold, uncontended line should not pay for coherence
/// traffic it doesn't need.
#[test]
fn uncontended_read_miss_lands_exclusive() {
    let mut system = MesiSystem::new(MesiConfig::default());

    system.submit(
        2,
        CpuRequest {
            address: 0x40,
            write: false,
            data: 0,
            size: 8,
        },
    );
    system.step_to_quiescence();

    assert_eq!(line_for(&system.l1_snapshot(2), 0x40).state, MesiState::Exclusive);
}
