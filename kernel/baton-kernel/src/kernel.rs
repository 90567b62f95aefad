//! The kernel context and the machine lifecycle.
//!
//! Everything the kernel knows lives in one [`Kernel`] value that is passed
//! by reference: the clock, the scheduler, the current process, the
//! pending-destroy slot and the process table. Several kernels can exist
//! side by side in one host process.
//!
//! [`Kernel::run`] boots the machine on the calling thread, which becomes
//! the boot process, and returns once the machine halts.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::thread::JoinHandle;

use baton_core::id::Pid;
use baton_core::interrupt::IntLevel;
use baton_core::kernel_assert;
use baton_core::stats::Statistics;
use baton_core::sync::{IrqCell, IrqCellGuard, Wake};

use crate::config::KernelConfig;
use crate::interrupt::{ClockController, ClockState};
use crate::machine::Hardware;
use crate::proc::Pcb;
use crate::sched::Scheduler;
use crate::timer::Timer;
use crate::{kdebug, kerr, kfatal};

/// Unwind payload that retires a vehicle whose process was destroyed or
/// whose machine halted.
pub(crate) struct VehicleExit;

/// How the machine stopped.
enum Outcome {
    Halted(Statistics),
    Fatal(Box<dyn Any + Send>),
}

/// One-shot host-side signal from the halting vehicle to [`Kernel::run`].
struct HaltSignal {
    raised: AtomicBool,
    slot: Mutex<Option<Outcome>>,
    cond: Condvar,
}

impl HaltSignal {
    const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
            slot: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    /// Records the outcome. Only the first outcome is kept.
    fn raise(&self, outcome: Outcome) -> bool {
        if self.raised.swap(true, Ordering::AcqRel) {
            return false;
        }
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        self.cond.notify_all();
        true
    }

    fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    fn wait(&self) -> Outcome {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = slot.take() {
                return outcome;
            }
            slot = self
                .cond
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// The kernel context.
pub struct Kernel {
    this: Weak<Kernel>,
    config: KernelConfig,
    hardware: Hardware,
    pub(crate) clock: IrqCell<ClockState>,
    pub(crate) scheduler: IrqCell<Scheduler>,
    pub(crate) current: IrqCell<Option<Arc<Pcb>>>,
    pub(crate) to_destroy: IrqCell<Option<Arc<Pcb>>>,
    processes: IrqCell<BTreeMap<Pid, Arc<Pcb>>>,
    vehicles: IrqCell<Vec<JoinHandle<()>>>,
    next_pid: AtomicU32,
    booted: AtomicBool,
    outcome: HaltSignal,
}

impl Kernel {
    /// Creates a kernel with no attached hardware.
    pub fn new(config: KernelConfig) -> Arc<Self> {
        Self::with_hardware(config, Hardware::default())
    }

    /// Creates a kernel driving the given collaborators.
    pub fn with_hardware(config: KernelConfig, hardware: Hardware) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            clock: IrqCell::named("clock", ClockState::new(config.ticks)),
            config,
            hardware,
            scheduler: IrqCell::named("scheduler", Scheduler::new()),
            current: IrqCell::named("current process", None),
            to_destroy: IrqCell::named("pending destroy", None),
            processes: IrqCell::named("process table", BTreeMap::new()),
            vehicles: IrqCell::named("vehicles", Vec::new()),
            next_pid: AtomicU32::new(Pid::BOOT.as_u32() + 1),
            booted: AtomicBool::new(false),
            outcome: HaltSignal::new(),
        })
    }

    /// Returns an owning handle to this kernel.
    pub fn handle(&self) -> Arc<Kernel> {
        match self.this.upgrade() {
            Some(kernel) => kernel,
            None => panic!("kernel invariant violated: kernel used after being dropped"),
        }
    }

    /// Returns the configuration the kernel was built with.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Returns the attached collaborators.
    pub fn hardware(&self) -> &Hardware {
        &self.hardware
    }

    /// Returns the clock/interrupt controller.
    pub fn clock(&self) -> ClockController<'_> {
        ClockController::new(self)
    }

    /// Borrows the scheduler. Interrupts must be disabled.
    pub fn scheduler(&self) -> IrqCellGuard<'_, Scheduler> {
        kernel_assert!(
            !self.clock().level().is_on(),
            "scheduler accessed with interrupts enabled"
        );
        self.scheduler.lock()
    }

    /// Returns the running process, if the machine has booted.
    pub fn current(&self) -> Option<Arc<Pcb>> {
        self.current.lock().clone()
    }

    /// Whether the machine has stopped.
    pub fn has_halted(&self) -> bool {
        self.outcome.is_raised()
    }

    // ── Process table ─────────────────────────────────────────────────

    /// Creates a process in the `Created` state and records it in the
    /// process table. Pids are never reused, and [`Pid::BOOT`] is kept for
    /// the boot process even when processes are created before boot.
    pub fn create_process(&self, name: impl Into<String>) -> Arc<Pcb> {
        let pid = Pid::new(self.next_pid.fetch_add(1, Ordering::Relaxed));
        self.register(pid, name.into())
    }

    fn register(&self, pid: Pid, name: String) -> Arc<Pcb> {
        let pcb = Arc::new(Pcb::new(pid, name));
        self.processes.lock().insert(pid, pcb.clone());
        kdebug!(PROCESS, "Created process {} ({})", pcb.name(), pid);
        pcb
    }

    /// Looks up a live process by pid.
    pub fn lookup(&self, pid: Pid) -> Option<Arc<Pcb>> {
        self.processes.lock().get(&pid).cloned()
    }

    /// Returns the pids of every process not yet destroyed.
    pub fn live_pids(&self) -> Vec<Pid> {
        self.processes.lock().keys().copied().collect()
    }

    pub(crate) fn unregister(&self, pid: Pid) {
        self.processes.lock().remove(&pid);
    }

    pub(crate) fn adopt_vehicle(&self, handle: JoinHandle<()>) {
        self.vehicles.lock().push(handle);
    }

    // ── Lifecycle ─────────────────────────────────────────────────────

    /// Boots the machine and runs `main` as the boot process.
    ///
    /// The calling thread becomes process 0. When `main` returns, the boot
    /// process finishes like any other. Returns the final statistics once
    /// no process is runnable and no interrupt is pending.
    ///
    /// # Panics
    ///
    /// Re-raises the panic of any process that breaks a kernel invariant,
    /// after every other process has been stopped. Panics if the kernel
    /// has already been run.
    pub fn run<F>(&self, main: F) -> Statistics
    where
        F: FnOnce(&Arc<Kernel>),
    {
        kernel_assert!(
            !self.booted.swap(true, Ordering::AcqRel),
            "kernel booted twice"
        );
        let this = self.handle();

        let boot = self.register(Pid::BOOT, String::from("main"));
        boot.boot_on_current_thread();
        *self.current.lock() = Some(boot);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.clock().set_level(IntLevel::On);
            if self.config.timer.is_attached() {
                Timer::attach(self, &self.config.timer);
            }
            main(&this);
            self.finish();
        }));
        if let Err(payload) = result {
            self.absorb_unwind(payload);
        }

        let outcome = self.outcome.wait();
        self.join_vehicles();
        self.teardown();
        match outcome {
            Outcome::Halted(stats) => stats,
            Outcome::Fatal(payload) => panic::resume_unwind(payload),
        }
    }

    /// Stops the machine with `stats` as its final statistics and retires
    /// the calling vehicle.
    pub(crate) fn shutdown(&self, stats: Statistics) -> ! {
        kernel_assert!(!self.outcome.is_raised(), "machine halted twice");
        self.release_all_vehicles();
        self.outcome.raise(Outcome::Halted(stats));
        panic::resume_unwind(Box::new(VehicleExit))
    }

    /// Handles a panic that reached the bottom of a vehicle.
    ///
    /// Retiring vehicles unwind with [`VehicleExit`]. Anything else is a
    /// fatal kernel or process error that stops the whole machine.
    pub(crate) fn absorb_unwind(&self, payload: Box<dyn Any + Send>) {
        if payload.is::<VehicleExit>() {
            return;
        }
        kfatal!("machine stopped: {}", panic_message(payload.as_ref()));
        self.release_all_vehicles();
        self.outcome.raise(Outcome::Fatal(payload));
    }

    /// Wakes every parked vehicle with [`Wake::Exit`].
    fn release_all_vehicles(&self) {
        let Some(table) = self.processes.try_lock() else {
            return;
        };
        for pcb in table.values() {
            if pcb.is_started() && !pcb.is_on_current_thread() {
                pcb.baton().release(Wake::Exit);
            }
        }
    }

    fn join_vehicles(&self) {
        let handles = std::mem::take(&mut *self.vehicles.lock());
        for handle in handles {
            let name = handle.thread().name().unwrap_or("<unnamed>").to_owned();
            if let Err(payload) = handle.join() {
                kerr!(
                    "vehicle {name} died outside its process: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    /// Drops every kernel reference to processes and pending handlers so
    /// that closures holding kernel handles are released.
    fn teardown(&self) {
        self.clock.lock().pending.clear();
        self.scheduler.lock().clear();
        self.current.lock().take();
        self.to_destroy.lock().take();
        self.processes.lock().clear();
    }
}

/// Extracts the message of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
