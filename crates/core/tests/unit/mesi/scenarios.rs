use archsim_core::mesi::types::{CpuRequest, MesiState};
use archsim_core::mesi::MesiSystem;
use archsim_core::MesiConfig;
use pretty_assertions::assert_eq;

use crate::common::harness::line_for;

/// Two PEs read-miss the same line in turn (both land Shared), then one of
/// them writes: a write hit in Shared must go out as an explicit `BusUpgrade`
/// rather than silently flipping to Modified, so the other sharer still gets
/// invalidated.
#[test]
fn write_hit_in_shared_upgrades_and_invalidates_the_other_sharer() {
    let mut system = MesiSystem::new(MesiConfig::default());

    system.submit(
        0,
        CpuRequest {
            address: 0,
            write: false,
            data: 0,
            size: 8,
        },
    );
    system.step_to_quiescence();
    assert_eq!(line_for(&system.l1_snapshot(0), 0).state, MesiState::Exclusive);

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

    system.submit(
        0,
        CpuRequest {
            address: 0,
            write: true,
            data: 0xCAFE,
            size: 8,
        },
    );
    system.step_to_quiescence();

    assert_eq!(line_for(&system.l1_snapshot(0), 0).state, MesiState::Modified);
    assert!(!line_for(&system.l1_snapshot(1), 0).valid, "PE1's copy must be invalidated by the upgrade");
}

/// A dirty victim evicted to make room for a new line is written back to
/// DRAM before the new line's fill completes, so the stale owner's data
/// isn't simply dropped on eviction.
#[test]
fn modified_victim_is_written_back_before_the_new_line_fills() {
    let mut system = MesiSystem::new(MesiConfig::default());

    // Line A (set 0, tag 0) becomes Modified on PE0.
    system.submit(
        0,
        CpuRequest {
            address: 0,
            write: true,
            data: 0x1111,
            size: 8,
        },
    );
    system.step_to_quiescence();
    assert_eq!(line_for(&system.l1_snapshot(0), 0).state, MesiState::Modified);

    // Lines B and C also map to set 0 (stride of one set-index-space worth
    // of address, i.e. 8 sets * 32 bytes = 256 bytes) but carry distinct
    // tags, so with only 2 ways the second of them evicts the dirty line A.
    system.submit(
        0,
        CpuRequest {
            address: 0x100,
            write: false,
            data: 0,
            size: 8,
        },
    );
    system.step_to_quiescence();
    system.submit(
        0,
        CpuRequest {
            address: 0x200,
            write: false,
            data: 0,
            size: 8,
        },
    );
    system.step_to_quiescence();

    let set0 = &system.l1_snapshot(0)[0];
    assert!(set0.iter().all(|line| !line.valid || line.tag != 0), "the evicted Modified line must no longer be cached");

    let dram = system.dram_snapshot();
    let written_back = u64::from_le_bytes(dram[0..8].try_into().unwrap());
    assert_eq!(written_back, 0x1111, "the dirty line's data must have reached DRAM via write-back");
}
