//! The multi-threaded harness that wires four L1s, the bus arbiter, and DRAM
//! into one steppable system (§5, Core B).
//!
//! Six cooperative agents make up the system: four L1 controllers, one
//! bus arbiter, one DRAM. Here DRAM is a passive, mutex-guarded resource
//! rather than its own thread (see [`crate::mesi::dram`]'s doc comment for
//! why), so [`MesiSystem`] spawns five real OS threads: four L1 controllers
//! plus the bus arbiter. Two [`Barrier`]s give the coordinator exact control
//! over stepping granularity: `step()` releases every agent to run exactly
//! one `tick`, then blocks until all of them report back, giving the "UI may
//! sample state only between cycles" discipline from §5 for free.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::config::MesiConfig;
use crate::control::ControlCommand;
use crate::mesi::bus::Bus;
use crate::mesi::counters::{CounterSnapshot, Counters};
use crate::mesi::dram::Dram;
use crate::mesi::l1::L1;
use crate::mesi::types::CpuRequest;

/// The four-L1 / one-bus / one-DRAM multiprocessor, steppable from the UI
/// via [`ControlCommand`].
pub struct MesiSystem {
    l1s: [Arc<L1>; 4],
    bus: Arc<Bus>,
    dram: Arc<Dram>,
    counters: Arc<Counters>,
    start: Arc<Barrier>,
    done: Arc<Barrier>,
    shutdown: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    cycle: u64,
}

impl MesiSystem {
    /// Builds the system and spawns its worker threads, parked at the first barrier.
    #[must_use]
    pub fn new(config: MesiConfig) -> Self {
        let l1s: [Arc<L1>; 4] = std::array::from_fn(|_| Arc::new(L1::new(config.l1_sets, config.l1_ways)));
        let bus = Arc::new(Bus::new());
        let dram = Arc::new(Dram::new(config.dram_bytes));
        let counters = Arc::new(Counters::new());
        let start = Arc::new(Barrier::new(6));
        let done = Arc::new(Barrier::new(6));
        let shutdown = Arc::new(AtomicBool::new(false));
        let paused = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(5);
        for pe in 0..4 {
            let l1 = Arc::clone(&l1s[pe]);
            let bus_ref = Arc::clone(&bus);
            let counters_ref = Arc::clone(&counters);
            let start_ref = Arc::clone(&start);
            let done_ref = Arc::clone(&done);
            let shutdown_ref = Arc::clone(&shutdown);
            workers.push(thread::spawn(move || loop {
                start_ref.wait();
                if shutdown_ref.load(Ordering::Acquire) {
                    done_ref.wait();
                    break;
                }
                l1.tick(pe, &bus_ref, &counters_ref);
                trace!(pe, "l1 tick");
                done_ref.wait();
            }));
        }
        {
            let l1s_ref: [Arc<L1>; 4] = std::array::from_fn(|i| Arc::clone(&l1s[i]));
            let bus_ref = Arc::clone(&bus);
            let dram_ref = Arc::clone(&dram);
            let counters_ref = Arc::clone(&counters);
            let start_ref = Arc::clone(&start);
            let done_ref = Arc::clone(&done);
            let shutdown_ref = Arc::clone(&shutdown);
            workers.push(thread::spawn(move || loop {
                start_ref.wait();
                if shutdown_ref.load(Ordering::Acquire) {
                    done_ref.wait();
                    break;
                }
                bus_ref.tick(&l1s_ref, &dram_ref, &counters_ref);
                trace!("bus tick");
                done_ref.wait();
            }));
        }

        Self {
            l1s,
            bus,
            dram,
            counters,
            start,
            done,
            shutdown,
            paused,
            workers,
            cycle: 0,
        }
    }

    /// Queues a load/store for `pe`'s driver to issue once its L1 is idle.
    pub fn submit(&self, pe: usize, request: CpuRequest) {
        self.l1s[pe].submit(request);
    }

    /// This PE's L1 result from its most recently completed load.
    #[must_use]
    pub fn load_result(&self, pe: usize) -> u64 {
        self.l1s[pe].last_result()
    }

    /// The number of cycles advanced since construction or the last `reset`.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Current analysis counters.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// A read-only snapshot of every L1's lines.
    #[must_use]
    pub fn l1_snapshot(&self, pe: usize) -> Vec<Vec<crate::mesi::l1::Line>> {
        self.l1s[pe].snapshot()
    }

    /// A full copy of DRAM contents.
    #[must_use]
    pub fn dram_snapshot(&self) -> Vec<u8> {
        self.dram.snapshot()
    }

    /// A read-only snapshot of every UI-observable piece of state (§6).
    #[must_use]
    pub fn snapshot(&self) -> crate::snapshot::MesiSnapshot {
        crate::snapshot::MesiSnapshot {
            cycle: self.cycle,
            l1s: self.l1s.iter().map(|l1| l1.snapshot()).collect(),
            dram: self.dram.snapshot(),
            counters: self.counters.snapshot(),
        }
    }

    /// No PE has a pending request, no L1 is mid-transaction, and the bus
    /// holds no in-flight transaction.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.l1s.iter().all(|l1| l1.is_quiescent()) && (0..4).all(|pe| !self.bus.port(pe).has_pending_request())
    }

    /// Advances every agent by exactly one iteration.
    pub fn step(&mut self) {
        self.start.wait();
        self.done.wait();
        self.cycle += 1;
    }

    /// Advances `n` iterations.
    pub fn step_until(&mut self, n: u64) {
        for _ in 0..n {
            self.step();
        }
    }

    /// Steps until every agent is quiescent (no requests pending, no
    /// in-flight transactions) or a `Stop` command arrives, matching §5's
    /// "synchronize by waiting for quiescence before sampling" test-harness
    /// discipline.
    pub fn step_to_quiescence(&mut self) {
        self.paused.store(false, Ordering::Release);
        while !self.is_quiescent() && !self.paused.load(Ordering::Acquire) {
            self.step();
        }
    }

    /// Resets every agent to its power-on state. Workers remain parked at
    /// the barrier; this only clears their owned state between `step` calls.
    pub fn reset(&mut self) {
        for l1 in &self.l1s {
            l1.reset();
        }
        self.dram.reset();
        self.counters.reset();
        self.cycle = 0;
        debug!("mesi system reset");
    }

    /// Applies one UI control command.
    pub fn control(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::Reset => self.reset(),
            ControlCommand::Step => self.step(),
            ControlCommand::StepUntil(n) => self.step_until(n),
            ControlCommand::StepIndefinitely => self.step_to_quiescence(),
            ControlCommand::Stop => self.paused.store(true, Ordering::Release),
        }
    }
}

impl Drop for MesiSystem {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.start.wait();
        self.done.wait();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for MesiSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MesiSystem").field("cycle", &self.cycle).finish_non_exhaustive()
    }
}
