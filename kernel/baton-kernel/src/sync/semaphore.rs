//! Counting semaphore.
//!
//! [`Semaphore`] keeps a signed count. A negative count is the number of
//! processes blocked in [`p`](Semaphore::p), which are woken one at a time
//! in arrival order by [`v`](Semaphore::v).

use std::collections::VecDeque;
use std::sync::Arc;

use baton_core::interrupt::IntLevel;
use baton_core::kernel_assert;
use baton_core::sync::IrqCell;

use crate::kdebug;
use crate::kernel::Kernel;
use crate::proc::Pcb;

struct SemaphoreState {
    value: i32,
    queue: VecDeque<Arc<Pcb>>,
}

/// A counting semaphore for processes.
///
/// # Example
///
/// ```ignore
/// let done = Arc::new(Semaphore::new(kernel, "done", 0));
/// kernel.spawn("worker", { let done = done.clone(); move |()| done.v() }, ());
/// done.p(); // blocks until the worker signals
/// ```
pub struct Semaphore {
    kernel: Arc<Kernel>,
    name: String,
    state: IrqCell<SemaphoreState>,
}

impl Semaphore {
    /// Creates a semaphore with `initial` permits.
    pub fn new(kernel: &Kernel, name: impl Into<String>, initial: i32) -> Self {
        Self {
            kernel: kernel.handle(),
            name: name.into(),
            state: IrqCell::named(
                "semaphore",
                SemaphoreState {
                    value: initial,
                    queue: VecDeque::new(),
                },
            ),
        }
    }

    /// Returns the debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(super) fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Returns the count. Negative values count blocked processes.
    pub fn value(&self) -> i32 {
        self.state.lock().value
    }

    /// Returns the number of processes blocked on this semaphore.
    pub fn waiting(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Takes a permit, sleeping until one is available.
    ///
    /// # Panics
    ///
    /// Fatal inside an interrupt handler, which has no process to block.
    pub fn p(&self) {
        kernel_assert!(
            !self.kernel.clock().in_handler(),
            "P on {} inside an interrupt handler",
            self.name
        );
        let old = self.kernel.clock().set_level(IntLevel::Off);
        let me = self.kernel.current_process();

        let must_wait = {
            let mut st = self.state.lock();
            st.value -= 1;
            kdebug!(
                SYNC,
                "P on {} by {}: value now {}",
                self.name,
                me.name(),
                st.value
            );
            if st.value < 0 {
                st.queue.push_back(me);
                true
            } else {
                false
            }
        };
        if must_wait {
            self.kernel.sleep();
        }

        self.kernel.clock().set_level(old);
    }

    /// Returns a permit, waking the longest-blocked process if any.
    ///
    /// Safe to call from interrupt handlers.
    pub fn v(&self) {
        let old = self.kernel.clock().set_level(IntLevel::Off);

        let woken = {
            let mut st = self.state.lock();
            st.value += 1;
            kdebug!(SYNC, "V on {}: value now {}", self.name, st.value);
            st.queue.pop_front()
        };
        if let Some(pcb) = woken {
            kdebug!(SYNC, "V on {} wakes {}", self.name, pcb.name());
            self.kernel.scheduler().ready(pcb);
        }

        self.kernel.clock().set_level(old);
    }
}
