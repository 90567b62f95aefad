//! Hand-off baton for execution vehicles.
//!
//! Every process runs on its own host thread, but only the thread holding
//! the CPU may execute. A context switch releases the next process's baton
//! and then suspends on its own. The wake reason is latched in a one-slot
//! mailbox, so a release that races ahead of the matching suspend is never
//! lost.

use std::sync::PoisonError;

use super::loom_compat::{Condvar, Mutex};

/// Why a suspended vehicle was woken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The vehicle now owns the CPU and should continue.
    Run,
    /// The process was destroyed or the machine halted. The vehicle must
    /// unwind without touching kernel state.
    Exit,
}

/// A binary suspend/resume primitive owned by one execution vehicle.
pub struct Baton {
    slot: Mutex<Option<Wake>>,
    cond: Condvar,
}

impl Baton {
    /// Creates a baton with no pending wakeup.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    /// Wakes the owning vehicle with `wake`.
    ///
    /// A pending [`Wake::Exit`] is never downgraded to [`Wake::Run`].
    pub fn release(&self, wake: Wake) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if *slot != Some(Wake::Exit) {
            *slot = Some(wake);
        }
        drop(slot);
        self.cond.notify_one();
    }

    /// Blocks the calling thread until the baton is released, consuming
    /// the wake reason.
    pub fn suspend(&self) -> Wake {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(wake) = slot.take() {
                return wake;
            }
            slot = self
                .cond
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Whether a wakeup is latched and not yet consumed.
    pub fn is_released(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Default for Baton {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(all(test, loom))]
mod loom_tests {
    use loom::sync::Arc;
    use loom::sync::atomic::{AtomicUsize, Ordering};
    use loom::thread;

    use super::*;

    #[test]
    fn loom_handoff_is_exclusive() {
        loom::model(|| {
            let a = Arc::new(Baton::new());
            let b = Arc::new(Baton::new());
            let running = Arc::new(AtomicUsize::new(0));

            let handle = {
                let (a, b, running) = (a.clone(), b.clone(), running.clone());
                thread::spawn(move || {
                    assert_eq!(b.suspend(), Wake::Run);
                    assert_eq!(running.fetch_add(1, Ordering::SeqCst), 0);
                    running.fetch_sub(1, Ordering::SeqCst);
                    a.release(Wake::Run);
                })
            };

            assert_eq!(running.fetch_add(1, Ordering::SeqCst), 0);
            running.fetch_sub(1, Ordering::SeqCst);
            b.release(Wake::Run);
            assert_eq!(a.suspend(), Wake::Run);
            handle.join().unwrap();
        });
    }
}
