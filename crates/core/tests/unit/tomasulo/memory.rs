use crate::common::harness::{ldr, movi, run_to_halt, str_, swi};

#[test]
fn store_then_load_round_trips_through_the_d_cache() {
    let program = [
        movi(1, 0x400), // 0: r1 <- base address
        movi(2, 0xBEEF), // 1: r2 <- value to store
        str_(2, 1, 0),   // 2: mem64[r1] <- r2
        ldr(3, 1, 0),    // 3: r3 <- mem64[r1]
        swi(),           // 4
    ];
    let core = run_to_halt(&program, 500);
    assert_eq!(core.snapshot().registers[3].value, 0xBEEF);
}

#[test]
fn load_observes_a_store_to_a_different_offset_of_the_same_base() {
    let program = [
        movi(1, 0x400),
        movi(2, 7),
        str_(2, 1, 8),  // mem64[r1 + 8] <- 7
        movi(2, 9),
        str_(2, 1, 16), // mem64[r1 + 16] <- 9
        ldr(3, 1, 8),
        ldr(4, 1, 16),
        swi(),
    ];
    let core = run_to_halt(&program, 500);
    let snapshot = core.snapshot();
    assert_eq!(snapshot.registers[3].value, 7);
    assert_eq!(snapshot.registers[4].value, 9);
}
