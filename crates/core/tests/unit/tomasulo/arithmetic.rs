use crate::common::harness::{addi, movi, run_to_halt, sub, swi};

#[test]
fn add_immediate_then_subtract_commits_expected_value() {
    let program = [
        movi(1, 5),   // r1 <- 5
        addi(1, 1, 3), // r1 <- r1 + 3 = 8
        movi(2, 2),   // r2 <- 2
        sub(3, 1, 2), // r3 <- r1 - r2 = 6
        swi(),
    ];
    let core = run_to_halt(&program, 200);
    let snapshot = core.snapshot();
    assert_eq!(snapshot.registers[3].value, 6);
    assert!(snapshot.halted);
}

#[test]
fn subtraction_to_zero_sets_the_zero_flag() {
    let program = [movi(1, 4), sub(2, 1, 1), swi()];
    let core = run_to_halt(&program, 200);
    assert!(core.snapshot().flags.z());
}

#[test]
fn register_file_reflects_only_the_last_writer_after_rename() {
    // Two writers to r1 in flight; the architectural value after commit must
    // be the last one issued, not whichever happened to finish its
    // functional unit first.
    let program = [movi(1, 1), movi(1, 2), movi(1, 3), swi()];
    let core = run_to_halt(&program, 200);
    assert_eq!(core.snapshot().registers[1].value, 3);
}
