use crate::common::harness::{addi, bne, cmpi, movi, run_to_halt, subi, swi};

#[test]
fn bne_loop_accumulates_until_counter_reaches_zero() {
    // r1 = 3 (counter), r2 = 0 (sum); loop body adds 1 to r2 and
    // decrements r1 three times before falling through to SWI.
    let program = [
        movi(1, 3),    // 0: r1 <- 3
        movi(2, 0),    // 1: r2 <- 0
        addi(2, 2, 1), // 2: r2 <- r2 + 1   <-- loop body
        subi(1, 1, 1), // 3: r1 <- r1 - 1
        cmpi(1, 0),    // 4: compare r1, 0
        bne(-24),      // 5: pc=40, target=40-24=16=word 2, taken while r1 != 0
        swi(),         // 6
    ];
    let core = run_to_halt(&program, 500);
    let snapshot = core.snapshot();
    assert_eq!(snapshot.registers[1].value, 0);
    assert_eq!(snapshot.registers[2].value, 3);
}

#[test]
fn mispredicted_branch_discards_speculative_work_past_it() {
    // The static predictor assumes not-taken, but r1=0 != 1 so BNE actually
    // fires; everything fetched on the not-taken path (word 3) must be
    // squashed and only the branch target's write (word 4) should commit.
    let program = [
        movi(1, 0),   // 0
        cmpi(1, 1),   // 1: r1 != 1, BNE taken -> mispredict against not-taken
        bne(16),      // 2: pc=16, target=32 = word 4
        movi(2, 111), // 3: skipped
        movi(2, 222), // 4: landed on
        swi(),        // 5
    ];
    let core = run_to_halt(&program, 500);
    assert_eq!(core.snapshot().registers[2].value, 222);
}
