//! Interrupt-discipline cell.
//!
//! On a uniprocessor, kernel data is protected by disabling interrupts: the
//! code that touches it cannot be preempted, so it never waits. `IrqCell`
//! gives host threads the same contract. Access never blocks. Finding the
//! cell already borrowed means either a re-entrant borrow or a thread
//! running kernel code without holding the CPU, and both are fatal.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, TryLockError};

/// Kernel data guarded by the interrupt discipline instead of a lock.
pub struct IrqCell<T> {
    name: &'static str,
    inner: Mutex<T>,
}

impl<T> IrqCell<T> {
    /// Creates a cell. `name` appears in the diagnostic on misuse.
    pub const fn named(name: &'static str, value: T) -> Self {
        Self {
            name,
            inner: Mutex::new(value),
        }
    }

    /// Borrows the contents.
    ///
    /// # Panics
    ///
    /// Panics if the cell is already borrowed.
    pub fn lock(&self) -> IrqCellGuard<'_, T> {
        match self.try_lock() {
            Some(guard) => guard,
            None => panic!(
                "kernel invariant violated: `{}` borrowed re-entrantly or off the CPU",
                self.name
            ),
        }
    }

    /// Borrows the contents if nobody else holds them.
    ///
    /// A borrow abandoned by a panicking process is handed out as-is; the
    /// machine is being torn down by then.
    pub fn try_lock(&self) -> Option<IrqCellGuard<'_, T>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(IrqCellGuard { guard }),
            Err(TryLockError::Poisoned(poisoned)) => Some(IrqCellGuard {
                guard: poisoned.into_inner(),
            }),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Returns the diagnostic name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// Exclusive access to the contents of an [`IrqCell`].
pub struct IrqCellGuard<'a, T> {
    guard: MutexGuard<'a, T>,
}

impl<T> Deref for IrqCellGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for IrqCellGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

#[cfg(all(test, not(any(loom, shuttle))))]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn lock_and_mutate() {
        let cell = IrqCell::named("counter", 0u32);
        *cell.lock() += 5;
        assert_eq!(*cell.lock(), 5);
        assert_eq!(cell.name(), "counter");
    }

    #[test]
    #[should_panic(expected = "`ready queue` borrowed re-entrantly")]
    fn reentrant_borrow_is_fatal() {
        let cell = IrqCell::named("ready queue", Vec::<u32>::new());
        let _outer = cell.lock();
        let _inner = cell.lock();
    }

    #[test]
    fn try_lock_reports_contention() {
        let cell = IrqCell::named("slot", ());
        let guard = cell.lock();
        assert!(cell.try_lock().is_none());
        drop(guard);
        assert!(cell.try_lock().is_some());
    }

    #[test]
    fn abandoned_borrow_is_recovered() {
        let cell = Arc::new(IrqCell::named("table", 1u32));
        let result = {
            let cell = cell.clone();
            thread::spawn(move || {
                let mut guard = cell.lock();
                *guard = 2;
                panic!("process died holding the table");
            })
            .join()
        };
        assert!(result.is_err());
        assert_eq!(*cell.lock(), 2);
    }

    #[test]
    fn sequential_access_from_threads() {
        let cell = Arc::new(IrqCell::named("clock", 0u64));
        for _ in 0..4 {
            let cell = cell.clone();
            thread::spawn(move || *cell.lock() += 1).join().unwrap();
        }
        assert_eq!(*cell.lock(), 4);
    }
}
