//! The ready-queue scheduler and join bookkeeping.
//!
//! Policy is strict FIFO. The scheduler never switches by itself; the
//! process primitives pick the next process here and hand the CPU over.
//! Reach it through [`Kernel::scheduler`](crate::Kernel::scheduler), which
//! checks that interrupts are disabled.

use std::sync::Arc;

use baton_core::id::Pid;
use baton_core::process::ProcessState;
use baton_core::regs::RESULT_REG;
use baton_core::sched::{ReadyQueue, WaitTable};

use crate::proc::Pcb;
use crate::{kdebug, kwarn};

/// Ready queue plus the join wait table.
pub struct Scheduler {
    ready: ReadyQueue<Arc<Pcb>>,
    waiters: WaitTable<Arc<Pcb>>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self {
            ready: ReadyQueue::new(),
            waiters: WaitTable::new(),
        }
    }

    /// Marks `pcb` ready and appends it to the ready queue.
    pub fn ready(&mut self, pcb: Arc<Pcb>) {
        kdebug!(PROCESS, "Putting process {} on ready list.", pcb.name());
        pcb.set_state(ProcessState::Ready);
        self.ready.push(pcb);
    }

    /// Removes and returns the process that has been ready longest.
    pub fn next_to_run(&mut self) -> Option<Arc<Pcb>> {
        self.ready.pop()
    }

    /// Records `waiter` as joining on `target`.
    ///
    /// Only one waiter per target is kept. A displaced waiter is not woken
    /// by the target's exit.
    pub fn register_waiter(&mut self, target: Pid, waiter: Arc<Pcb>) {
        kdebug!(PROCESS, "Process {} waits for pid {target}", waiter.name());
        if let Some(displaced) = self.waiters.register(target, waiter) {
            kwarn!(
                "process {} no longer waits for pid {target}: another joiner replaced it",
                displaced.name()
            );
        }
    }

    /// Wakes whoever joins on `exited`, handing it `exit_code` in its
    /// result register. Returns `true` if a waiter was woken.
    pub fn notify_exit(&mut self, exited: Pid, exit_code: i32) -> bool {
        let Some(waiter) = self.waiters.take(exited) else {
            return false;
        };
        kdebug!(
            PROCESS,
            "Pid {exited} exited with {exit_code}; waking {}",
            waiter.name()
        );
        waiter.write_saved_register(RESULT_REG, exit_code);
        self.ready(waiter);
        true
    }

    /// Whether `pid` currently sits in the ready queue.
    pub fn exists_runnable(&self, pid: Pid) -> bool {
        self.ready.contains_by(|pcb| pcb.pid() == pid)
    }

    /// Returns the pids in the ready queue, head first.
    pub fn ready_pids(&self) -> Vec<Pid> {
        self.ready.iter().map(|pcb| pcb.pid()).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.ready.clear();
        self.waiters.clear();
    }
}
