//! Blocking synchronization for processes.
//!
//! These primitives block by putting the calling process to sleep, not by
//! blocking its host thread. Atomicity comes from disabling simulated
//! interrupts around each operation.

mod lock;
mod semaphore;

pub use lock::Lock;
pub use semaphore::Semaphore;
