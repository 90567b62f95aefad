//! Workloads that exercise the kernel.
//!
//! Each workload runs as the body of the boot process and forks the
//! processes it needs. The machine halts once they are all done or all
//! blocked.

use std::sync::Arc;

use baton_core::id::Pid;
use baton_core::sync::IrqCell;
use baton_kernel::sync::Semaphore;
use baton_kernel::{JoinOutcome, Kernel, kdebug, kprintln};

use crate::cli::{JoinArgs, ProcessesArgs, WaterArgs};

// ===========================================================================
// Yield ping-pong
// ===========================================================================

/// Forks `count` processes that each print and yield `loops` times.
pub fn processes(kernel: &Arc<Kernel>, args: &ProcessesArgs) {
    kdebug!(PROCESS, "Entering process test");
    let loops = args.loops;
    for which in 0..args.count {
        let k = kernel.clone();
        kernel.spawn(
            format!("forked process{which}"),
            move |which: u32| {
                for num in 0..loops {
                    kprintln!("*** Process {which} looped {num} times.");
                    k.yield_now();
                }
            },
            which,
        );
    }
}

// ===========================================================================
// Water
// ===========================================================================

/// Atoms left and used, updated by each oxygen atom that completes a
/// molecule.
struct Tally {
    hydrogen_left: i64,
    oxygen_left: i64,
}

struct Reactor {
    /// First hydrogen of a pair waits here for its partner.
    hydrogen: Semaphore,
    /// Oxygen waits here for a hydrogen pair.
    oxygen: Semaphore,
    /// Hydrogen waits here until its molecule is made.
    bonded: Semaphore,
    pairing: Semaphore,
    tallying: Semaphore,
    arrivals: IrqCell<u64>,
    tally: IrqCell<Tally>,
    hydrogen_total: i64,
    oxygen_total: i64,
}

impl Reactor {
    fn new(kernel: &Kernel, args: &WaterArgs) -> Self {
        Self {
            hydrogen: Semaphore::new(kernel, "SemH", 0),
            oxygen: Semaphore::new(kernel, "SemO", 0),
            bonded: Semaphore::new(kernel, "wait", 0),
            pairing: Semaphore::new(kernel, "MUTEX", 1),
            tallying: Semaphore::new(kernel, "MUTEX1", 1),
            arrivals: IrqCell::named("hydrogen arrivals", 0),
            tally: IrqCell::named("atom tally", Tally {
                hydrogen_left: args.hydrogen.into(),
                oxygen_left: args.oxygen.into(),
            }),
            hydrogen_total: args.hydrogen.into(),
            oxygen_total: args.oxygen.into(),
        }
    }

    fn hydrogen_atom(&self, id: u32) {
        self.pairing.p();
        let first_of_pair = {
            let mut arrivals = self.arrivals.lock();
            let first = *arrivals % 2 == 0;
            *arrivals += 1;
            first
        };
        self.pairing.v();

        if first_of_pair {
            self.hydrogen.p();
        } else {
            self.hydrogen.v();
            self.oxygen.v();
        }

        self.bonded.p();
        kprintln!("H atom #{id} used in making water.");
    }

    fn oxygen_atom(&self, id: u32) {
        self.oxygen.p();
        kprintln!("** Water made! Splash!! **");
        self.bonded.v();
        self.bonded.v();

        self.tallying.p();
        let (h_left, o_left) = {
            let mut tally = self.tally.lock();
            tally.hydrogen_left -= 2;
            tally.oxygen_left -= 1;
            (tally.hydrogen_left, tally.oxygen_left)
        };
        kprintln!("Numbers Left: H Atoms: {h_left}, O Atoms: {o_left}");
        kprintln!(
            "Numbers Used: H Atoms: {}, O Atoms: {}",
            self.hydrogen_total - h_left,
            self.oxygen_total - o_left
        );
        self.tallying.v();
        kprintln!("O atom #{id} used in making water.");
    }
}

/// Forks hydrogen and oxygen atoms that combine into water.
///
/// Atoms that cannot find partners stay blocked, and the machine halts
/// with them still waiting.
pub fn water(kernel: &Arc<Kernel>, args: &WaterArgs) {
    let reactor = Arc::new(Reactor::new(kernel, args));

    for id in 0..args.hydrogen {
        let reactor = reactor.clone();
        kernel.spawn(format!("hAtom{id}"), move |id: u32| reactor.hydrogen_atom(id), id);
    }
    for id in 0..args.oxygen {
        let reactor = reactor.clone();
        kernel.spawn(format!("oAtom{id}"), move |id: u32| reactor.oxygen_atom(id), id);
    }
}

// ===========================================================================
// Join
// ===========================================================================

/// Forks a child that works for a while and exits with `args.code`, then
/// joins on it.
pub fn join(kernel: &Arc<Kernel>, args: &JoinArgs) {
    let k = kernel.clone();
    let steps = args.steps;
    let child = kernel.spawn(
        "child",
        move |code: i32| {
            for step in 0..steps {
                kprintln!("child working, step {step}");
                k.yield_now();
            }
            kprintln!("child exiting with {code}");
            k.exit(code);
        },
        args.code,
    );

    let me = kernel.current_process().pid();
    report_join(me, kernel.join(me));
    report_join(child.pid(), kernel.join(child.pid()));
    report_join(child.pid(), kernel.join(child.pid()));
}

fn report_join(target: Pid, outcome: JoinOutcome) {
    match outcome {
        JoinOutcome::Exited(code) => kprintln!("join {target}: exited with {code}"),
        JoinOutcome::Rejected => kprintln!(
            "join {target}: rejected ({})",
            JoinOutcome::REJECTED_CODE
        ),
    }
}
