//! Mutual-exclusion lock.

use baton_core::id::Pid;
use baton_core::interrupt::IntLevel;
use baton_core::kernel_assert;
use baton_core::sync::IrqCell;

use super::Semaphore;
use crate::kdebug;
use crate::kernel::Kernel;

/// A lock owned by at most one process at a time.
///
/// Built on a binary [`Semaphore`], plus the identity of the holder so that
/// only the holder may release it.
pub struct Lock {
    name: String,
    sem: Semaphore,
    holder: IrqCell<Option<Pid>>,
}

impl Lock {
    /// Creates an unheld lock.
    pub fn new(kernel: &Kernel, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            sem: Semaphore::new(kernel, format!("{name} semaphore"), 1),
            name,
            holder: IrqCell::named("lock holder", None),
        }
    }

    /// Returns the debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the pid of the holder.
    pub fn holder(&self) -> Option<Pid> {
        *self.holder.lock()
    }

    /// Whether the running process holds the lock.
    pub fn is_held_by_current(&self) -> bool {
        let me = self.sem.kernel().current_process();
        self.holder() == Some(me.pid())
    }

    /// Takes the lock, sleeping while another process holds it.
    ///
    /// # Panics
    ///
    /// Re-acquiring a lock the caller already holds is fatal.
    pub fn acquire(&self) {
        let kernel = self.sem.kernel();
        let old = kernel.clock().set_level(IntLevel::Off);
        let me = kernel.current_process();
        kernel_assert!(
            self.holder() != Some(me.pid()),
            "process {} acquired lock {} twice",
            me.name(),
            self.name
        );

        self.sem.p();
        *self.holder.lock() = Some(me.pid());
        kdebug!(SYNC, "Lock {} acquired by {}", self.name, me.name());
        kernel.clock().set_level(old);
    }

    /// Releases the lock, waking the longest waiter if any.
    ///
    /// # Panics
    ///
    /// Releasing a lock the caller does not hold is fatal.
    pub fn release(&self) {
        let kernel = self.sem.kernel();
        let old = kernel.clock().set_level(IntLevel::Off);
        let me = kernel.current_process();
        kernel_assert!(
            self.holder() == Some(me.pid()),
            "process {} released lock {} it does not hold",
            me.name(),
            self.name
        );

        *self.holder.lock() = None;
        kdebug!(SYNC, "Lock {} released by {}", self.name, me.name());
        self.sem.v();
        kernel.clock().set_level(old);
    }
}
