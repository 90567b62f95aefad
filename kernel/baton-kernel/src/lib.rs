//! Baton kernel library.
//!
//! A simulated uniprocessor kernel hosted on ordinary threads. Every
//! process rides its own host thread (its vehicle), but only the process
//! holding the CPU baton ever runs; all others are parked. Simulated time
//! advances on interrupt re-enables, user instructions and idle
//! fast-forwards, so every run is reproducible.
//!
//! The entry point is [`Kernel::run`]:
//!
//! ```ignore
//! let kernel = Kernel::new(KernelConfig::default());
//! let stats = kernel.run(|kernel| {
//!     kernel.spawn("worker", |n: u32| println!("worker {n}"), 1);
//!     kernel.yield_now();
//! });
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod interrupt;
pub mod kernel;
pub mod log;
pub mod machine;
pub mod proc;
pub mod sched;
pub mod sync;
pub mod syscall;
pub mod timer;

pub use config::KernelConfig;
pub use kernel::Kernel;
pub use log::LogLevel;
pub use proc::{JoinOutcome, Pcb};
