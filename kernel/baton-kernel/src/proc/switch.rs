//! Process primitives and the context-switch protocol.
//!
//! Every primitive here runs on the vehicle of the current process. A
//! switch hands the CPU to the next process by releasing its baton and
//! then parks the caller on its own baton. Control comes back to the line
//! after `suspend`, in the switched-out process, once someone switches to
//! it again.
//!
//! A finishing process cannot free itself while running on its own vehicle,
//! so it parks itself in the kernel's pending-destroy slot. The next
//! process to get the CPU destroys it, either right after its own switch
//! returns or as the first thing its new vehicle does.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use baton_core::id::Pid;
use baton_core::interrupt::IntLevel;
use baton_core::kernel_assert;
use baton_core::process::ProcessState;
use baton_core::regs::{PC_REG, RESULT_REG};
use baton_core::sync::Wake;

use super::{Entry, Pcb};
use crate::kdebug;
use crate::kernel::{Kernel, VehicleExit};

/// Result of joining on another process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The target exited with this code.
    Exited(i32),
    /// The target is the caller, the boot process, or not waiting in the
    /// ready queue. The caller did not block.
    Rejected,
}

impl JoinOutcome {
    /// Value returned to user programs in the result register.
    pub const REJECTED_CODE: i32 = -1;

    /// Encodes the outcome for the result register.
    pub const fn as_register(self) -> i32 {
        match self {
            Self::Exited(code) => code,
            Self::Rejected => Self::REJECTED_CODE,
        }
    }
}

impl Kernel {
    /// Returns the running process.
    ///
    /// # Panics
    ///
    /// Fatal before boot, or when called from a thread that is not the
    /// running process's vehicle.
    pub fn current_process(&self) -> Arc<Pcb> {
        let current = self.current.lock().clone();
        let Some(pcb) = current else {
            panic!("kernel invariant violated: no process is running");
        };
        kernel_assert!(
            pcb.is_on_current_thread(),
            "process {} driven from a thread that is not its vehicle",
            pcb.name()
        );
        pcb
    }

    /// Makes `pcb` runnable with `entry(arg)` as its body.
    ///
    /// The vehicle is created on first dispatch. When `entry` returns, the
    /// process finishes.
    pub fn fork<A, F>(&self, pcb: &Arc<Pcb>, entry: F, arg: A)
    where
        A: Send + 'static,
        F: FnOnce(A) + Send + 'static,
    {
        let old = self.clock().set_level(IntLevel::Off);
        kdebug!(PROCESS, "Forking process {} ({})", pcb.name(), pcb.pid());
        pcb.install_entry(Box::new(move || entry(arg)));
        self.scheduler().ready(pcb.clone());
        self.clock().set_level(old);
    }

    /// Creates and forks a process in one step.
    pub fn spawn<A, F>(&self, name: impl Into<String>, entry: F, arg: A) -> Arc<Pcb>
    where
        A: Send + 'static,
        F: FnOnce(A) + Send + 'static,
    {
        let pcb = self.create_process(name);
        self.fork(&pcb, entry, arg);
        pcb
    }

    /// Gives up the CPU to the next ready process, if there is one.
    ///
    /// The caller goes to the back of the ready queue. Returns immediately
    /// when nothing else is ready.
    pub fn yield_now(&self) {
        let old = self.clock().set_level(IntLevel::Off);
        let me = self.current_process();
        kdebug!(PROCESS, "Yielding process {}", me.name());

        let next = self.scheduler().next_to_run();
        if let Some(next) = next {
            self.scheduler().ready(me.clone());
            self.switch_to(&me, next);
        }
        self.clock().set_level(old);
    }

    /// Blocks the current process until something readies it again.
    ///
    /// The caller must already have arranged to be woken (queued on a
    /// semaphore, registered as a joiner) and must have disabled
    /// interrupts. Idles the machine while nothing is ready; if nothing
    /// will ever be ready, the machine halts.
    pub fn sleep(&self) {
        let me = self.current_process();
        kernel_assert!(
            !self.clock().level().is_on(),
            "process {} slept with interrupts enabled",
            me.name()
        );
        kdebug!(PROCESS, "Sleeping process {}", me.name());
        me.set_state(ProcessState::Blocked);

        let next = loop {
            let next = self.scheduler().next_to_run();
            match next {
                Some(next) => break next,
                None => self.clock().idle(),
            }
        };
        self.switch_to(&me, next);
    }

    /// Terminates the current process. Never returns.
    ///
    /// The process is destroyed by whichever process runs next.
    pub fn finish(&self) -> ! {
        self.clock().set_level(IntLevel::Off);
        let me = self.current_process();
        kdebug!(PROCESS, "Finishing process {}", me.name());
        {
            let mut slot = self.to_destroy.lock();
            kernel_assert!(
                slot.is_none(),
                "process {} finished while another awaits destruction",
                me.name()
            );
            *slot = Some(me.clone());
        }
        self.sleep();
        panic!(
            "kernel invariant violated: finished process {} was resumed",
            me.name()
        )
    }

    /// Terminates the current process with `code`, waking its joiner.
    pub fn exit(&self, code: i32) -> ! {
        self.clock().set_level(IntLevel::Off);
        let me = self.current_process();
        kdebug!(PROCESS, "Process {} exits with {code}", me.name());
        self.scheduler().notify_exit(me.pid(), code);
        self.finish()
    }

    /// Waits for `target` to exit and returns its exit code.
    ///
    /// The join is rejected without blocking when `target` is the caller,
    /// the boot process, or not sitting in the ready queue (for example
    /// because it already exited).
    pub fn join(&self, target: Pid) -> JoinOutcome {
        let old = self.clock().set_level(IntLevel::Off);
        let me = self.current_process();
        let runnable = self.scheduler().exists_runnable(target);
        if target == me.pid() || target == Pid::BOOT || !runnable {
            kdebug!(PROCESS, "Process {} cannot join pid {target}", me.name());
            self.clock().set_level(old);
            return JoinOutcome::Rejected;
        }

        self.scheduler().register_waiter(target, me.clone());
        self.sleep();
        let code = me.saved_register(RESULT_REG);
        self.clock().set_level(old);
        JoinOutcome::Exited(code)
    }

    // ── Switching ─────────────────────────────────────────────────────

    /// Hands the CPU from `old` (the caller) to `next`.
    ///
    /// Returns when some process switches back to `old`.
    pub(crate) fn switch_to(&self, old: &Arc<Pcb>, next: Arc<Pcb>) {
        if Arc::ptr_eq(old, &next) {
            next.set_state(ProcessState::Running);
            return;
        }

        self.save_user_state(old);
        *self.current.lock() = Some(next.clone());
        next.set_state(ProcessState::Running);
        kdebug!(PROCESS, "Switching from {} to {}", old.name(), next.name());

        self.dispatch(&next);
        match old.baton().suspend() {
            Wake::Run => {}
            Wake::Exit => panic::resume_unwind(Box::new(VehicleExit)),
        }

        kdebug!(PROCESS, "Now in process {}", old.name());
        self.reap_destroyed();
        self.restore_user_state(old);
    }

    fn dispatch(&self, next: &Arc<Pcb>) {
        if !next.is_started() {
            self.start_vehicle(next);
        }
        next.baton().release(Wake::Run);
    }

    fn start_vehicle(&self, pcb: &Arc<Pcb>) {
        let Some(entry) = pcb.take_entry() else {
            panic!(
                "kernel invariant violated: process {} dispatched without a body",
                pcb.name()
            );
        };
        pcb.mark_started();

        let kernel = self.handle();
        let vehicle_pcb = pcb.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", pcb.name(), pcb.pid()))
            .spawn(move || vehicle_main(&kernel, &vehicle_pcb, entry));
        match spawned {
            Ok(handle) => self.adopt_vehicle(handle),
            Err(e) => panic!(
                "kernel invariant violated: no vehicle for process {}: {e}",
                pcb.name()
            ),
        }
    }

    /// Destroys the process waiting in the pending-destroy slot, if any.
    pub(crate) fn reap_destroyed(&self) {
        let victim = self.to_destroy.lock().take();
        if let Some(pcb) = victim {
            self.destroy(&pcb);
        }
    }

    fn destroy(&self, pcb: &Pcb) {
        kernel_assert!(
            !pcb.is_on_current_thread(),
            "process {} destroyed while running",
            pcb.name()
        );
        kdebug!(PROCESS, "Deleting process {}", pcb.name());
        pcb.set_state(ProcessState::Killed);
        drop(pcb.take_address_space());
        self.unregister(pcb.pid());
        if pcb.is_started() {
            pcb.baton().release(Wake::Exit);
        }
    }

    fn save_user_state(&self, pcb: &Pcb) {
        if !pcb.has_address_space() {
            return;
        }
        if let Some(cpu) = &self.hardware().cpu {
            let regs = cpu.save_registers();
            kdebug!(MACHINE, "Saving user state of {} at pc {}", pcb.name(), regs[PC_REG]);
            pcb.set_saved_registers(regs);
        }
        pcb.with_address_space(|space| space.save_state());
    }

    pub(crate) fn restore_user_state(&self, pcb: &Pcb) {
        if !pcb.has_address_space() {
            return;
        }
        if let Some(cpu) = &self.hardware().cpu {
            let regs = pcb.saved_registers();
            kdebug!(MACHINE, "Restoring user state of {} at pc {}", pcb.name(), regs[PC_REG]);
            cpu.restore_registers(&regs);
        }
        pcb.with_address_space(|space| space.restore_state());
    }
}

/// Body of every vehicle thread except the boot process's.
fn vehicle_main(kernel: &Kernel, pcb: &Pcb, entry: Entry) {
    if pcb.baton().suspend() == Wake::Exit {
        return;
    }
    pcb.bind_vehicle();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        kernel.reap_destroyed();
        kdebug!(PROCESS, "Starting process {}", pcb.name());
        kernel.clock().set_level(IntLevel::On);
        entry();
        kernel.finish();
    }));
    if let Err(payload) = result {
        kernel.absorb_unwind(payload);
    }
}
