//! The clock/interrupt controller.
//!
//! Simulated time only moves when the kernel says so: each off→on
//! transition of the interrupt level charges one tick, and an idle machine
//! fast-forwards to the next pending event. Due events are delivered in
//! fire-time order with interrupts disabled and the machine in system mode.

use baton_core::interrupt::{IntLevel, InterruptKind, MachineMode, PendingQueue};
use baton_core::kernel_assert;
use baton_core::stats::{Statistics, TickCosts};

use crate::kernel::Kernel;
use crate::log::{DebugFlags, debug_enabled};
use crate::{kdebug, kprintln};

/// A deferred interrupt handler with its argument already bound.
pub(crate) type Handler = Box<dyn FnOnce(&Kernel) + Send>;

/// Interrupt-controller state, owned by the kernel context.
pub(crate) struct ClockState {
    level: IntLevel,
    mode: MachineMode,
    in_handler: bool,
    yield_on_return: bool,
    costs: TickCosts,
    stats: Statistics,
    pub(crate) pending: PendingQueue<Handler>,
}

impl ClockState {
    pub(crate) fn new(costs: TickCosts) -> Self {
        Self {
            level: IntLevel::Off,
            mode: MachineMode::System,
            in_handler: false,
            yield_on_return: false,
            costs,
            stats: Statistics::default(),
            pending: PendingQueue::new(),
        }
    }
}

/// A view of the kernel's clock and interrupt state.
///
/// Obtained from [`Kernel::clock`]. The view borrows nothing but the
/// kernel, so it can be created freely wherever the kernel is reachable.
#[derive(Clone, Copy)]
pub struct ClockController<'k> {
    kernel: &'k Kernel,
}

impl<'k> ClockController<'k> {
    pub(crate) fn new(kernel: &'k Kernel) -> Self {
        Self { kernel }
    }

    /// Returns the current interrupt level.
    pub fn level(&self) -> IntLevel {
        self.kernel.clock.lock().level
    }

    /// Returns what the CPU is doing.
    pub fn mode(&self) -> MachineMode {
        self.kernel.clock.lock().mode
    }

    /// Switches between system and user execution.
    pub fn set_mode(&self, mode: MachineMode) {
        self.kernel.clock.lock().mode = mode;
    }

    /// Whether an interrupt handler is executing.
    pub fn in_handler(&self) -> bool {
        self.kernel.clock.lock().in_handler
    }

    /// Returns the current simulated time.
    pub fn total_ticks(&self) -> u64 {
        self.kernel.clock.lock().stats.total_ticks
    }

    /// Returns a snapshot of the machine statistics.
    pub fn stats(&self) -> Statistics {
        self.kernel.clock.lock().stats.clone()
    }

    /// Returns the number of interrupts waiting to fire.
    pub fn pending_count(&self) -> usize {
        self.kernel.clock.lock().pending.len()
    }

    /// Changes the interrupt level and returns the previous one.
    ///
    /// Re-enabling interrupts advances the clock one tick, which may
    /// deliver interrupts and, if a handler asked for it, yield the CPU.
    ///
    /// # Panics
    ///
    /// Enabling interrupts from inside a handler is fatal.
    pub fn set_level(&self, now: IntLevel) -> IntLevel {
        let old = {
            let mut st = self.kernel.clock.lock();
            kernel_assert!(
                now == IntLevel::Off || !st.in_handler,
                "interrupts enabled inside an interrupt handler"
            );
            std::mem::replace(&mut st.level, now)
        };
        kdebug!(INTERRUPT, "\tinterrupts: {old} -> {now}");
        if old == IntLevel::Off && now == IntLevel::On {
            self.advance_tick();
        }
        old
    }

    /// Advances simulated time by one tick and delivers due interrupts.
    ///
    /// Called on every interrupt re-enable, and by the execution unit once
    /// per user instruction.
    pub fn advance_tick(&self) {
        {
            let mut st = self.kernel.clock.lock();
            let costs = st.costs;
            match st.mode {
                MachineMode::System => st.stats.charge_system(costs.system),
                MachineMode::User | MachineMode::Idle => st.stats.charge_user(costs.user),
            }
            kdebug!(INTERRUPT, "== Tick {} ==", st.stats.total_ticks);
            st.level = IntLevel::Off;
        }

        while self.check_due(false) {}

        let yield_now = {
            let mut st = self.kernel.clock.lock();
            st.level = IntLevel::On;
            std::mem::take(&mut st.yield_on_return)
        };
        if yield_now {
            self.kernel.yield_now();
        }
    }

    /// Schedules `handler(kernel, arg)` to run `delay` ticks from now.
    ///
    /// # Panics
    ///
    /// A zero delay is fatal.
    pub fn schedule<A, F>(&self, handler: F, arg: A, delay: u64, kind: InterruptKind)
    where
        A: Send + 'static,
        F: FnOnce(&Kernel, A) + Send + 'static,
    {
        kernel_assert!(delay > 0, "{kind} interrupt scheduled with zero delay");
        let mut st = self.kernel.clock.lock();
        let when = st.stats.total_ticks + delay;
        kdebug!(
            INTERRUPT,
            "Scheduling {kind} interrupt at time = {when}"
        );
        st.pending
            .insert(when, kind, Box::new(move |kernel: &Kernel| handler(kernel, arg)));
    }

    /// Delivers the earliest pending interrupt if it is due.
    ///
    /// With `advance_if_idle`, an interrupt in the future is made due by
    /// fast-forwarding the clock and charging the gap as idle time.
    /// Returns `true` if a handler ran.
    ///
    /// # Panics
    ///
    /// Must be called with interrupts disabled.
    pub fn check_due(&self, advance_if_idle: bool) -> bool {
        if debug_enabled(DebugFlags::INTERRUPT) {
            self.dump_state();
        }
        let (entry, old_mode) = {
            let mut st = self.kernel.clock.lock();
            kernel_assert!(
                st.level == IntLevel::Off,
                "pending interrupts checked with interrupts enabled"
            );
            let Some(next) = st.pending.pop_first() else {
                return false;
            };

            if next.fire_time > st.stats.total_ticks {
                if !advance_if_idle {
                    st.pending.restore(next);
                    return false;
                }
                st.stats.idle_until(next.fire_time);
                kdebug!(
                    INTERRUPT,
                    "Advancing clock to {} while idle",
                    st.stats.total_ticks
                );
            }

            // A lone timer tick would fire forever on an idle machine.
            if st.mode == MachineMode::Idle
                && next.kind == InterruptKind::Timer
                && st.pending.is_empty()
            {
                st.pending.restore(next);
                return false;
            }

            kdebug!(
                INTERRUPT,
                "Invoking interrupt handler for the {} at time {}",
                next.kind,
                next.fire_time
            );
            st.in_handler = true;
            let old_mode = std::mem::replace(&mut st.mode, MachineMode::System);
            (next, old_mode)
        };

        (entry.handler)(self.kernel);

        let mut st = self.kernel.clock.lock();
        st.mode = old_mode;
        st.in_handler = false;
        true
    }

    /// Waits for the next interrupt, or halts if none will ever come.
    ///
    /// Called when no process is ready. Must be called with interrupts
    /// disabled.
    pub fn idle(&self) {
        kdebug!(INTERRUPT, "Machine idling; checking for interrupts.");
        self.set_mode(MachineMode::Idle);
        if self.check_due(true) {
            while self.check_due(false) {}
            let mut st = self.kernel.clock.lock();
            st.yield_on_return = false;
            st.mode = MachineMode::System;
            return;
        }

        kdebug!(INTERRUPT, "Machine idle. No interrupts to do.");
        kprintln!("No threads ready or runnable, and no pending interrupts.");
        kprintln!("Assuming the program completed.");
        self.halt();
    }

    /// Stops the machine, printing the final statistics. Never returns.
    pub fn halt(&self) -> ! {
        let stats = self.stats();
        kprintln!("Machine halting!\n");
        kprintln!("{stats}");
        self.kernel.shutdown(stats)
    }

    /// Asks for the interrupted process to yield once the current handler
    /// returns.
    ///
    /// # Panics
    ///
    /// Fatal outside an interrupt handler.
    pub fn yield_on_return(&self) {
        let mut st = self.kernel.clock.lock();
        kernel_assert!(st.in_handler, "yield_on_return outside an interrupt handler");
        st.yield_on_return = true;
    }

    /// Logs every pending interrupt in firing order.
    pub fn dump_state(&self) {
        let st = self.kernel.clock.lock();
        kprintln!("Time: {}, interrupts {}", st.stats.total_ticks, st.level);
        kprintln!("Pending interrupts:");
        if st.pending.is_empty() {
            kprintln!("    none");
        }
        for entry in st.pending.iter() {
            kprintln!("    {} at time {}", entry.kind, entry.fire_time);
        }
    }
}
